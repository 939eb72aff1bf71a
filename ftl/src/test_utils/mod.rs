pub mod mock_ingest;
