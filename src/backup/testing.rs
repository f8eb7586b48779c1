//! In-memory Neo4j that answers the queries the backup workflows issue.
//!
//! Exported and imported GraphML lives in the [`FakeRuntime`] file map, so a
//! backup taken from one fake can be restored into another.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use crate::backup::graphml;
use crate::error::AppError;
use crate::graph::{Connector, CypherExecutor, Params, QueryError, Record};
use crate::runtime::testing::FakeRuntime;

#[derive(Default)]
struct State {
    nodes: usize,
    relationships: usize,
    no_apoc: bool,
    queries: Vec<String>,
}

#[derive(Clone)]
pub(crate) struct FakeNeo4j {
    runtime: Arc<FakeRuntime>,
    import_dir: String,
    state: Arc<Mutex<State>>,
}

impl FakeNeo4j {
    pub(crate) fn new(runtime: Arc<FakeRuntime>, import_dir: &str) -> Self {
        Self {
            runtime,
            import_dir: import_dir.trim_end_matches('/').to_string(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub(crate) fn seed(&self, nodes: usize, relationships: usize) {
        let mut state = self.state.lock().unwrap();
        state.nodes = nodes;
        state.relationships = relationships;
    }

    pub(crate) fn without_apoc(&self) {
        self.state.lock().unwrap().no_apoc = true;
    }

    pub(crate) fn counts(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.nodes, state.relationships)
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }

    /// A GraphML document with `nodes` nodes and `edges` edges chained
    /// `n0 -> n1 -> ...`.
    pub(crate) fn graphml(nodes: usize, edges: usize) -> String {
        let mut xml = String::from(
            "<?xml version='1.0' encoding='UTF-8'?>\n\
             <graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n\
             <key id=\"name\" for=\"node\" attr.name=\"name\"/>\n\
             <graph id=\"G\" edgedefault=\"directed\">\n",
        );
        for i in 0..nodes {
            xml.push_str(&format!(
                "<node id=\"n{i}\" labels=\":Item\"><data key=\"name\">item{i}</data></node>\n"
            ));
        }
        for i in 0..edges {
            xml.push_str(&format!(
                "<edge id=\"e{i}\" source=\"n{}\" target=\"n{}\" label=\"NEXT\"/>\n",
                i % nodes.max(1),
                (i + 1) % nodes.max(1)
            ));
        }
        xml.push_str("</graph>\n</graphml>\n");
        xml
    }

    fn path_of(&self, file_name: &str) -> String {
        format!("{}/{}", self.import_dir, file_name.trim_start_matches('/'))
    }

    fn respond(&self, cypher: &str, params: &Params) -> Result<Vec<Record>, QueryError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(cypher.to_string());

        if cypher.contains("apoc.help") {
            let count = if state.no_apoc { 0 } else { 1 };
            return Ok(vec![row([("count", json!(count))])]);
        }

        if cypher.contains("apoc.export.graphml.all") {
            let file = params
                .get("file")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string();
            let document = Self::graphml(state.nodes, state.relationships);
            self.runtime.put_file(&self.path_of(&file), document.as_bytes());
            return Ok(vec![row([
                ("file", json!(file)),
                ("nodes", json!(state.nodes)),
                ("relationships", json!(state.relationships)),
                ("time", json!(3)),
            ])]);
        }

        if cypher.contains("apoc.import.graphml") {
            let url = params
                .get("url")
                .and_then(JsonValue::as_str)
                .unwrap_or_default();
            let name = url.trim_start_matches("file://");
            let content = self
                .runtime
                .file(&self.path_of(name))
                .ok_or_else(|| QueryError::failed(format!("{} not found", url), cypher))?;
            let (nodes, edges) = graphml::count_elements(&String::from_utf8_lossy(&content));
            state.nodes += nodes;
            state.relationships += edges;
            return Ok(vec![row([
                ("nodes", json!(nodes)),
                ("relationships", json!(edges)),
                ("time", json!(5)),
            ])]);
        }

        if cypher.contains("DETACH DELETE") {
            state.nodes = 0;
            state.relationships = 0;
            return Ok(Vec::new());
        }

        if cypher.contains("count(n)") {
            return Ok(vec![row([("count", json!(state.nodes))])]);
        }
        if cypher.contains("count(r)") {
            return Ok(vec![row([("count", json!(state.relationships))])]);
        }

        Ok(vec![row([("ok", json!(1))])])
    }
}

fn row<const N: usize>(columns: [(&str, JsonValue); N]) -> Record {
    columns.into_iter().collect()
}

#[async_trait]
impl CypherExecutor for FakeNeo4j {
    async fn execute_query(&self, cypher: &str, params: Params) -> Result<Vec<Record>, QueryError> {
        self.respond(cypher, &params)
    }
}

/// Hands out sessions on a [`FakeNeo4j`] while its container is up.
pub(crate) struct FakeConnector {
    pub(crate) neo4j: FakeNeo4j,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<Box<dyn CypherExecutor>, AppError> {
        if !self.neo4j.runtime.is_up() {
            return Err(AppError::Internal("connection refused".to_string()));
        }
        Ok(Box::new(self.neo4j.clone()))
    }
}
