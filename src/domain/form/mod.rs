//! Field model, form rendering, collection and validation

pub mod builder;
pub mod field;
pub mod path;
pub mod render;
pub mod session;
pub mod state;
pub mod validator;

pub use builder::FieldModelBuilder;
pub use field::{
    is_empty_value, FieldDescriptor, FieldKind, FieldModel, SelectOption, ValidationRules,
};
pub use path::{FieldPath, PathParseError, PathSegment};
pub use render::{ControlView, FormRenderer, FormView, InputType, Widget};
pub use session::{FormSession, SessionError, Submission};
pub use state::{collect, flatten, infer_branch, state_from_fields, CollectionMismatchError, FormState};
pub use validator::{ValidationError, Validator};
