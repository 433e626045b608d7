use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("position buffer length {0} is not a multiple of 3")]
    PositionLength(usize),

    #[error("vertex {0} has a non-finite coordinate")]
    NonFinitePosition(usize),

    #[error("index entry {position} refers to vertex {vertex}, but only {vertex_count} vertices exist")]
    IndexOutOfRange {
        position: usize,
        vertex: u32,
        vertex_count: usize,
    },

    #[error("index length {length} is not a multiple of the primitive stride {stride}")]
    IndexLength { length: usize, stride: usize },

    #[error("attribute `{name}` has {length} entries, expected {vertex_count}")]
    AttributeLength {
        name: &'static str,
        length: usize,
        vertex_count: usize,
    },
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("group {start}..{end} is not aligned to the primitive stride {stride}")]
    MisalignedGroup { start: u32, end: u32, stride: usize },

    #[error("group {start}..{end} exceeds the index length {length}")]
    GroupOutOfBounds { start: u32, end: u32, length: usize },

    #[error("build range {start}..{end} exceeds the primitive count {count}")]
    InvalidRange { start: u32, end: u32, count: usize },

    #[error("`{0}` must be at least 1")]
    ZeroOption(&'static str),

    #[error("background build panicked")]
    WorkerPanic,
}

#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("root {root} is malformed: {reason}")]
    MalformedRoot { root: usize, reason: String },

    #[error("index has {actual} entries, the geometry expects {expected}")]
    IndexMismatch { expected: usize, actual: usize },

    #[error("indirect buffer has {actual} entries, the geometry has {expected} primitives")]
    IndirectMismatch { expected: usize, actual: usize },

    #[error("leaf in root {root} addresses slots up to {end}, only {slots} exist")]
    SlotOutOfRange { root: usize, end: u64, slots: usize },

    #[error("not a serialized hierarchy (bad magic)")]
    BadMagic,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
