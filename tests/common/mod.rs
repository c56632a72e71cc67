pub mod zip_fixture;
