//! Schema system - section registry, validation, prompting and previews

pub mod field;
pub mod registry;
pub mod render;
pub mod template;
pub mod validator;
pub mod wizard;

pub use field::{FieldError, FieldKind, FieldSpec, ObjectSpec, ALLOCATION_TOTAL_FIELD};
pub use registry::{RegistryError, SchemaRegistry, Section, UiGroup};
pub use render::{render_section, Prompter, TerminalPrompter};
pub use template::{PreviewContext, TemplateError, TemplateGenerator};
pub use validator::{validate_section, SectionValidator, ValidationReport, ValidationResult};
pub use wizard::{Advance, NavigationError, WizardController, WizardError, WizardPhase, WizardState};
