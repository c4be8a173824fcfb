use derive_more::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Error {
    #[display(fmt = "file exists")]
    AlreadyExists,
    #[display(fmt = "no such file or directory")]
    NotFound,
    #[display(fmt = "is a directory")]
    IsADirectory,
    #[display(fmt = "not a directory")]
    NotADirectory,
    #[display(fmt = "file name too long")]
    NameTooLong,
    #[display(fmt = "file too large")]
    FileTooLarge,
    #[display(fmt = "read-only file system")]
    ReadOnly,
    #[display(fmt = "invalid argument")]
    InvalidArgument,
}

impl core::error::Error for Error {}
