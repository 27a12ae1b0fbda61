pub mod jwt;
pub mod schema;

pub use jwt::{generate_jwt_inputs, generate_jwt_inputs_for_digests};
pub use schema::{check_inputs, jwt_field_defs, parse_inputs, CircuitInputs, FieldShape, InputValue};
