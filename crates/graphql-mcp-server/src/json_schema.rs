/// Build the input schema of a tool from its input type
#[macro_export]
macro_rules! schema_from_type {
    ($type:ty) => {{
        match serde_json::to_value(schemars::schema_for!($type)) {
            Ok(Value::Object(schema)) => schema,
            _ => panic!("Input schema of {} is not an object", stringify!($type)),
        }
    }};
}
