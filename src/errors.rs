use thiserror::Error;

/// Everything that can stop the resolver. None of these are recoverable: the configuration has
/// to be fixed and the tool run again.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    /* Configuration errors. */
    #[error("image `{image}` has a malformed placement: {reason}")]
    MalformedPlacement { image: String, reason: String },

    #[error("image `{0}` is reserved for the application and cannot be declared")]
    ReservedName(String),

    /* Unsatisfiable constraints. */
    #[error("none of the candidates {candidates:?} of image `{image}` is present")]
    DanglingCandidates {
        image: String,
        candidates: Vec<String>,
    },

    #[error("image `{0}` is placed relative to itself")]
    SelfReference(String),

    #[error("both `{first}` and `{second}` want to be placed last")]
    MultipleLast { first: String, second: String },

    #[error("placement did not converge after {passes} passes, constraints are conflicting")]
    NoConvergence { passes: usize },

    #[error("the order does not contain every image exactly once")]
    IncompleteOrder,

    /* Sizes. */
    #[error("size of image `{0}` is neither declared nor configured")]
    MissingSize(String),

    #[error("images take {total:#x} bytes in total, which exceeds flash size {flash_size:#x}")]
    ImagesTooLarge { total: u64, flash_size: u64 },

    #[error("image `{0}` would get a negative size or address")]
    NegativeSize(String),
}
