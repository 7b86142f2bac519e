use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("block type `{0}` is already registered")]
    DuplicateType(String),
    #[error("legacy id {id} is already claimed by `{owner}`")]
    DuplicateLegacyId { id: u16, owner: String },
    #[error("legacy id {id} is above {max}")]
    LegacyIdRange { id: u16, max: u16 },
    #[error("block type `{name}` needs {bits} state bits, at most {max} fit")]
    StateTooWide { name: String, bits: u32, max: u32 },
    #[error("property `{property}` of `{block}` has no values")]
    EmptyProperty { block: String, property: String },
    #[error("shape of `{block}` reads property `{property}` which is not a declared boolean")]
    BadShapeProperty { block: String, property: String },
    #[error("unknown shape kind `{0}`")]
    UnknownShape(String),
    #[error("block id space is exhausted")]
    Full,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("texture `{name}` lies outside the {width}x{height} atlas")]
    TextureOutOfBounds { name: String, width: u32, height: u32 },
}
