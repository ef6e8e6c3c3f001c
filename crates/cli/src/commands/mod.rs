pub(crate) mod advance;
pub(crate) mod init;
pub(crate) mod migrate;
pub(crate) mod status;
