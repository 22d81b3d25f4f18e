pub mod object_server;
pub mod stall_server;
