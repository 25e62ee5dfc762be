mod group_tests;
mod health_tests;
mod message_tests;
mod realtime_tests;
