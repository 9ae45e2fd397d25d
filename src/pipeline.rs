pub(crate) mod config;
pub(crate) mod flows;
pub(crate) mod job;
pub(crate) mod result;
