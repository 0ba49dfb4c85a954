/// Errors that can occur during record encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The buffer is shorter than the record's fixed wire size.
    #[error("truncated {name} record ({available} bytes, need {needed})")]
    Truncated {
        name: &'static str,
        needed: usize,
        available: usize,
    },

    /// An encoder wrote a different number of bytes than the layout declares.
    #[error("encoded {name} is {actual} bytes, layout declares {expected}")]
    EncodedSize {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, FrameError>;
