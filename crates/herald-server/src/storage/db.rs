//! SQLite database handle for the Herald server.

herald_core::define_database!(HeraldDatabase, "Herald database migrations complete");
