//! Content stream operator implementations.
//!
//! Only operators that affect image discovery have behaviour:
//! - `graphics_state` - q, Q, cm
//! - `xobject` - Do and inline images (BI/ID/EI)

mod graphics_state;
mod xobject;
