use crate::obj::{BitId, ObjType, PartialOid};

pub type BitResult<T> = Result<T, BitGenericError>;
pub type BitGenericError = anyhow::Error;

/// The structured error cases a caller may want to pattern match on or
/// classify, as opposed to the opaque [`BitGenericError`] every public
/// function actually returns. Construct one of these and wrap it in
/// `anyhow::Error::from` (or just `?`) at the point of failure; recover it
/// with [`BitErrorExt::try_into_bit_error`] at a point that wants to branch.
#[derive(Debug, thiserror::Error)]
pub enum BitError {
    #[error("object `{0}` not found")]
    ObjectNotFound(BitId),

    #[error("prefix `{0}` is ambiguous")]
    AmbiguousPrefix(PartialOid, Vec<crate::obj::Oid>),

    #[error("unexpected end of input while reading {0}")]
    Truncated(&'static str),

    #[error("corrupt {what}: {detail}")]
    Corrupt { what: &'static str, detail: String },

    #[error("io error on `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{path}` is not a valid repository")]
    BadRepo { path: String },

    #[error("`{0}` is not a valid object id prefix")]
    BadPrefix(String),

    #[error("expected object `{0}` to be a {1}, found {2}")]
    WrongObjectType(crate::obj::Oid, ObjType, ObjType),
}

impl BitError {
    pub fn corrupt(what: &'static str, detail: impl Into<String>) -> Self {
        Self::Corrupt { what, detail: detail.into() }
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

pub trait BitErrorExt {
    fn try_into_bit_error(self) -> BitResult<BitError>;
    fn try_into_obj_not_found_err(self) -> BitResult<BitId>;
}

impl BitErrorExt for BitGenericError {
    fn try_into_bit_error(self) -> BitResult<BitError> {
        self.downcast::<BitError>()
    }

    fn try_into_obj_not_found_err(self) -> BitResult<BitId> {
        match self.try_into_bit_error()? {
            BitError::ObjectNotFound(id) => Ok(id),
            err => Err(anyhow::anyhow!(err)),
        }
    }
}

/// Lets a caller ask "should I try the next tier" or "should I give up
/// entirely" without string-matching a message. `NotFound` from the loose
/// tier is the canonical case for the former; a checksum mismatch or a
/// malformed delta is the canonical case for the latter.
pub trait BitResultExt {
    fn is_not_found_err(&self) -> bool;
    fn is_fatal(&self) -> bool;
}

macro_rules! error_ext_is_method {
    ($method:ident) => {
        fn $method(&self) -> bool {
            match self {
                Ok(..) => false,
                Err(err) => err.$method(),
            }
        }
    };
}

impl<T> BitResultExt for BitResult<T> {
    error_ext_is_method!(is_not_found_err);

    error_ext_is_method!(is_fatal);
}

impl BitResultExt for BitGenericError {
    fn is_not_found_err(&self) -> bool {
        matches!(self.downcast_ref::<BitError>(), Some(BitError::ObjectNotFound(..)))
    }

    fn is_fatal(&self) -> bool {
        match self.downcast_ref::<BitError>() {
            Some(err) => !matches!(err, BitError::ObjectNotFound(..) | BitError::AmbiguousPrefix(..)),
            None => true,
        }
    }
}
