use rocket::Route;

mod ballotbox;

pub use ballotbox::Updated;

/// Where the ballot box routes are mounted.
pub const BASE: &str = "/api/v1/ballotbox";

pub fn routes() -> Vec<Route> {
    ballotbox::routes()
}
