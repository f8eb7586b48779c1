//! Connection wrapper around the Neo4j Bolt driver.
//!
//! Components above this module depend on [`CypherExecutor`] only, so the
//! health checker and backup workflows can be exercised against fakes.
//!
//! # Usage
//!
//! ```ignore
//! use neo4j_manager::graph::{Neo4jConnection, QueryExt};
//!
//! let conn = Neo4jConnection::open("bolt://localhost:7687", "neo4j", "secret").await?;
//! let rows = conn
//!     .query("MATCH (n:Person) WHERE n.name = $name RETURN n.age AS age")
//!     .param("name", "Alice")
//!     .fetch_all()
//!     .await?;
//! ```

mod neo4j;
mod query;
mod record;
mod traits;

pub use neo4j::{Credentials, Neo4jConnection, Neo4jConnector};
pub use query::{clear_database, labels, node_count, relationship_count, Query, QueryExt};
pub use record::{Params, Record};
pub use traits::{Connector, CypherExecutor, QueryError};
