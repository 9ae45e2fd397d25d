pub(crate) mod backend;
pub(crate) mod dispatch;
pub(crate) mod model;
pub(crate) mod registry;
