use std::{fmt::Display, time::Duration};

use log::{info, warn};
use postgres::{Client, NoTls, Transaction};

/// Run `op` up to `max_attempts` times.  When attempt `i` (0-based) fails
/// with an error for which `is_retryable` is true, sleep `(i + 1) * base_wait`
/// before the next attempt.  The last error is returned once the attempts
/// are used up.  Non retryable errors are returned immediately.
pub fn retry_with_linear_backoff<T, E, F, R>(
    max_attempts: u32,
    base_wait: Duration,
    is_retryable: R,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
    R: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !is_retryable(&e) || attempt + 1 >= max_attempts {
                    return Err(e);
                }
                let wait = base_wait * (attempt + 1);
                warn!(
                    "Connection failed (attempt {}): {}, retrying in {:?}...",
                    attempt + 1,
                    e,
                    wait
                );
                std::thread::sleep(wait);
                attempt += 1;
            }
        }
    }
}

/// Open a PostgreSQL connection.  Every failure to connect is retried: a
/// refused socket, a timeout, rejected credentials or a database that does
/// not exist yet while the server is still initialising.
/// Suggested `max_attempts = 3`, `base_wait = Duration::from_secs(2)`.
pub fn connect_with_retry(
    config: &postgres::Config,
    max_attempts: u32,
    base_wait: Duration,
) -> Result<Session, postgres::Error> {
    retry_with_linear_backoff(max_attempts, base_wait, |_| true, |attempt| {
        if attempt > 0 {
            info!("Connecting to database (attempt {})", attempt + 1);
        }
        config.connect(NoTls)
    })
    .map(Session::new)
}

/// A database session owned by a single run.  The connection is closed when
/// the session goes out of scope, on every exit path.
pub struct Session {
    client: Client,
}

impl Session {
    pub fn new(client: Client) -> Self {
        Session { client }
    }

    /// Start an explicit transaction.  Dropping it without calling `commit`
    /// rolls it back.
    pub fn transaction(&mut self) -> Result<Transaction<'_>, postgres::Error> {
        self.client.transaction()
    }

    pub fn client(&mut self) -> &mut Client {
        &mut self.client
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        info!("Closing database connection");
    }
}

/// Quote an SQL identifier, doubling any embedded double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
