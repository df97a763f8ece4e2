//! # Template Model
//!
//! A template is a saved scene: metadata plus an ordered element list whose
//! first entry is conventionally the background.
//!
//! ## Roles
//!
//! Elements carry their semantic role (`description`, `price`, `validity`,
//! `legalText`, `productImage`, or a free-form tag) as persisted data under
//! the `id` key. Keyword matching on text content only fills in roles for
//! legacy templates that carry no tags at all (see [`RoleInference`]).
//!
//! ## Restore order
//!
//! ```text
//! clear scene
//!   → background (cover-fitted) → settle
//!   → grid cells → images → texts → settle
//! ```

mod codec;
mod model;

pub use codec::{
    RestoreReport, RoleInference, deserialize_into, infer_roles, is_price_text, load_template,
    serialize_scene, serialize_template,
};
pub use model::{DEFAULT_TEMPLATE_DESCRIPTION, DEFAULT_TEMPLATE_NAME, ElementRecord, Template};
