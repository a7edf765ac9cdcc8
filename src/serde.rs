pub mod base64_vec;
