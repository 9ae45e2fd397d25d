pub(crate) mod detect;
pub(crate) mod resolver;
