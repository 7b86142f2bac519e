//! Property schemas and the bit layout used to pack property values into a `StateBits`.
//!
//! Properties are packed in declaration order, each taking just enough bits for its
//! value count. The legacy protocol uses the same convention for its data nibble, so
//! a slab's 8-valued `variant` lands in bits 0..3 and its `top` flag in bit 3.

use crate::types::StateBits;

const MAX_STATE_BITS: u32 = StateBits::BITS;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: String,
    pub values: Vec<String>,
}

impl PropertyDef {
    /// Boolean property; `false` is value 0 so it is also the default.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: vec!["false".to_string(), "true".to_string()],
        }
    }

    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn is_boolean(&self) -> bool {
        self.values.len() == 2 && self.values[0] == "false" && self.values[1] == "true"
    }

    #[inline]
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.values.iter().position(|v| v == value)
    }

    /// Bits needed to store any value index of this property.
    #[inline]
    pub fn bits(&self) -> u32 {
        let n = self.values.len();
        if n <= 1 {
            0
        } else {
            usize::BITS - (n - 1).leading_zeros()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct StateField {
    offset: u32,
    bits: u32,
    len: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateLayout {
    fields: Vec<StateField>,
    total_bits: u32,
}

impl StateLayout {
    /// Computes the layout, or returns the required bit count when it exceeds `StateBits`.
    pub fn new(props: &[PropertyDef]) -> Result<Self, u32> {
        let mut fields = Vec::with_capacity(props.len());
        let mut offset = 0u32;
        for p in props {
            let bits = p.bits();
            fields.push(StateField {
                offset,
                bits,
                len: p.values.len(),
            });
            offset += bits;
        }
        if offset > MAX_STATE_BITS {
            return Err(offset);
        }
        Ok(Self {
            fields,
            total_bits: offset,
        })
    }

    #[inline]
    pub fn total_bits(&self) -> u32 {
        self.total_bits
    }

    /// Number of distinct bit patterns, valid or not.
    #[inline]
    pub fn state_count(&self) -> usize {
        1usize << self.total_bits
    }

    /// Packs per-property value indices. Indices beyond a field's range wrap into it.
    pub fn pack(&self, indices: &[usize]) -> StateBits {
        let mut state: u32 = 0;
        for (f, &ix) in self.fields.iter().zip(indices) {
            if f.bits == 0 {
                continue;
            }
            let mask = (1u32 << f.bits) - 1;
            state |= (ix as u32 & mask) << f.offset;
        }
        state as StateBits
    }

    #[inline]
    pub fn value_index(&self, state: StateBits, field: usize) -> Option<usize> {
        let f = self.fields.get(field)?;
        if f.bits == 0 {
            return Some(0);
        }
        let mask = (1u32 << f.bits) - 1;
        Some(((u32::from(state) >> f.offset) & mask) as usize)
    }

    /// True when no stray bits are set and every field names an existing value.
    pub fn is_valid(&self, state: StateBits) -> bool {
        if u32::from(state) >> self.total_bits != 0 {
            return false;
        }
        self.fields.iter().enumerate().all(|(i, f)| {
            self.value_index(state, i)
                .map(|ix| ix < f.len)
                .unwrap_or(false)
        })
    }

    /// Every valid state in ascending bit order.
    pub fn valid_states(&self) -> impl Iterator<Item = StateBits> + '_ {
        (0..self.state_count()).filter_map(move |s| {
            let s = s as StateBits;
            self.is_valid(s).then_some(s)
        })
    }
}
