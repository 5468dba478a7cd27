mod state;

pub use state::ClientState;
