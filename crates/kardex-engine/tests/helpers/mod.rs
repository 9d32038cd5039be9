pub mod mock_cmdb;
pub mod mock_source;
