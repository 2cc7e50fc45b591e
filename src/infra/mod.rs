pub mod ndjson_output_adapter;
pub mod payload_reader;
