mod error_location;
mod masked_number;
