use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Header, Response, Server};

/// A request as the stub server saw it.
#[derive(Clone, Debug, PartialEq)]
pub struct LoggedRequest {
    pub method: String,
    pub path: String,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl LoggedRequest {
    /// `"METHOD /path"`, handy for ordering assertions.
    pub fn line(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Canned reply that takes precedence over the resource store.
struct Override {
    method: String,
    path: String,
    status: u16,
    body: String,
    delay: Option<Duration>,
    remaining: Option<usize>,
}

type Action = Box<dyn Fn(&mut Store, &Value) -> (u16, Value) + Send>;

/// In-memory REST resources keyed by collection path.
#[derive(Default)]
pub struct Store {
    collections: Vec<(String, String)>,
    records: BTreeMap<String, BTreeMap<u64, Value>>,
    next_id: u64,
}

impl Store {
    /// Look up a stored record.
    pub fn get(&self, collection: &str, id: u64) -> Option<&Value> {
        self.records.get(&collection.to_lowercase())?.get(&id)
    }

    /// Mutable access to a stored record.
    pub fn get_mut(&mut self, collection: &str, id: u64) -> Option<&mut Value> {
        self.records.get_mut(&collection.to_lowercase())?.get_mut(&id)
    }

    /// Total number of stored records across collections.
    pub fn len(&self) -> usize {
        self.records.values().map(BTreeMap::len).sum()
    }

    /// Split a lowercased path into its collection and optional numeric id.
    fn route(&self, path: &str) -> Option<(String, String, Option<u64>)> {
        let mut best: Option<(String, String, Option<u64>)> = None;
        for (collection, id_field) in &self.collections {
            let matched = if path == collection {
                Some(None)
            } else {
                path.strip_prefix(collection.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                    .and_then(|rest| rest.parse::<u64>().ok())
                    .map(Some)
            };
            if let Some(id) = matched {
                let longer = best
                    .as_ref()
                    .map_or(true, |(c, _, _)| collection.len() > c.len());
                if longer {
                    best = Some((collection.clone(), id_field.clone(), id));
                }
            }
        }
        best
    }

    fn handle(&mut self, method: &str, path: &str, body: Option<&Value>) -> (u16, Value) {
        let Some((collection, id_field, id)) = self.route(path) else {
            return (404, json!({"error": "not found"}));
        };
        let records = self.records.entry(collection).or_default();

        match (method, id) {
            ("POST", None) => {
                let Some(Value::Object(fields)) = body else {
                    return (400, json!({"error": "expected a JSON object"}));
                };
                self.next_id += 1;
                let mut record = fields.clone();
                record.insert(id_field, json!(self.next_id));
                let record = Value::Object(record);
                records.insert(self.next_id, record.clone());
                (201, record)
            }
            ("GET", None) => (200, Value::Array(records.values().cloned().collect())),
            ("GET", Some(id)) => match records.get(&id) {
                Some(record) => (200, record.clone()),
                None => (404, json!({"error": "not found"})),
            },
            ("PUT", Some(id)) => {
                let (Some(existing), Some(Value::Object(fields))) = (records.get_mut(&id), body)
                else {
                    return (404, json!({"error": "not found"}));
                };
                let mut record = fields.clone();
                record.insert(id_field, json!(id));
                *existing = Value::Object(record);
                (200, existing.clone())
            }
            ("DELETE", Some(id)) => match records.remove(&id) {
                Some(_) => (204, Value::Null),
                None => (404, json!({"error": "not found"})),
            },
            _ => (405, json!({"error": "method not allowed"})),
        }
    }
}

struct State {
    store: Store,
    actions: Vec<(String, String, Action)>,
    overrides: Vec<Override>,
    log: Vec<LoggedRequest>,
}

/// REST stub served by tiny_http on an ephemeral local port.
///
/// Paths match case-insensitively, so `/api/Student` and `/api/student`
/// reach the same collection.
pub struct StubServer {
    addr: SocketAddr,
    server: Arc<Server>,
    state: Arc<Mutex<State>>,
    handle: Option<JoinHandle<()>>,
}

impl StubServer {
    /// Start an empty server (every path answers 404).
    pub fn start() -> Result<Self> {
        let server = Server::http("127.0.0.1:0").map_err(|e| anyhow!("failed to bind: {}", e))?;
        let addr = server
            .server_addr()
            .to_ip()
            .context("stub server has no IP address")?;
        let server = Arc::new(server);
        let state = Arc::new(Mutex::new(State {
            store: Store::default(),
            actions: Vec::new(),
            overrides: Vec::new(),
            log: Vec::new(),
        }));

        let handle = {
            let server = Arc::clone(&server);
            let state = Arc::clone(&state);
            thread::spawn(move || {
                for mut request in server.incoming_requests() {
                    let method = request.method().as_str().to_uppercase();
                    let path = request.url().split('?').next().unwrap_or("").to_string();
                    let headers = request
                        .headers()
                        .iter()
                        .map(|h| (h.field.to_string(), h.value.to_string()))
                        .collect();
                    let mut raw = String::new();
                    let _ = request.as_reader().read_to_string(&mut raw);
                    let body = serde_json::from_str::<Value>(&raw).ok();

                    let (status, reply, delay) = {
                        let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
                        state.log.push(LoggedRequest {
                            method: method.clone(),
                            path: path.clone(),
                            body: body.clone(),
                            headers,
                        });
                        state.respond(&method, &path.to_lowercase(), body.as_ref())
                    };

                    if let Some(delay) = delay {
                        thread::sleep(delay);
                    }
                    let mut response = Response::from_string(reply).with_status_code(status);
                    if let Ok(header) = Header::from_bytes("Content-Type", "application/json") {
                        response = response.with_header(header);
                    }
                    let _ = request.respond(response);
                }
            })
        };

        Ok(Self {
            addr,
            server,
            state,
            handle: Some(handle),
        })
    }

    /// A server modelling the campus API used by the built-in scenarios.
    pub fn campus() -> Result<Self> {
        let server = Self::start()?
            .with_collection("/api/student", "student_id")
            .with_collection("/api/library/books", "book_id")
            .with_collection("/api/library/issue", "issue_id")
            .with_collection("/api/hostel", "hostel_id")
            .with_collection("/api/hostel/rooms", "room_id")
            .with_collection("/api/hostel/allocations", "allocation_id")
            .with_collection("/api/exam", "exam_id")
            .with_collection("/api/fees", "fee_id")
            .with_collection("/api/role", "role_id")
            .with_collection("/api/user", "user_id")
            .with_action("POST", "/api/library/issue/return", |store, body| {
                let Some(id) = body.get("issueId").and_then(Value::as_u64) else {
                    return (400, json!({"error": "issueId required"}));
                };
                match store.get_mut("/api/library/issue", id) {
                    Some(Value::Object(issue)) => {
                        issue.insert("status".into(), json!("returned"));
                        issue.insert("return_date".into(), body["returnDate"].clone());
                        (200, Value::Object(issue.clone()))
                    }
                    _ => (404, json!({"error": "issue not found"})),
                }
            });
        Ok(server)
    }

    /// Serve a CRUD collection at `path`, assigning ids under `id_field`.
    pub fn with_collection(self, path: &str, id_field: &str) -> Self {
        self.state()
            .store
            .collections
            .push((path.to_lowercase(), id_field.to_string()));
        self
    }

    /// Handle `method path` with custom logic against the store.
    pub fn with_action<F>(self, method: &str, path: &str, action: F) -> Self
    where
        F: Fn(&mut Store, &Value) -> (u16, Value) + Send + 'static,
    {
        self.state()
            .actions
            .push((method.to_uppercase(), path.to_lowercase(), Box::new(action)));
        self
    }

    /// Always answer `method path` with a canned status and body.
    pub fn respond_with(&self, method: &str, path: &str, status: u16, body: &str) {
        self.push_override(method, path, status, body, None, None);
    }

    /// Answer `method path` with a canned reply once, then fall back.
    pub fn respond_once(&self, method: &str, path: &str, status: u16, body: &str) {
        self.push_override(method, path, status, body, None, Some(1));
    }

    /// Hold the reply to `method path` for `delay`.
    pub fn delay(&self, method: &str, path: &str, delay: Duration) {
        self.push_override(method, path, 200, "{}", Some(delay), None);
    }

    fn push_override(
        &self,
        method: &str,
        path: &str,
        status: u16,
        body: &str,
        delay: Option<Duration>,
        remaining: Option<usize>,
    ) {
        self.state().overrides.push(Override {
            method: method.to_uppercase(),
            path: path.to_lowercase(),
            status,
            body: body.to_string(),
            delay,
            remaining,
        });
    }

    /// Base URL for a [`verdict_core::RunConfig`].
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.state().log.clone()
    }

    /// `"METHOD /path"` for every request received so far.
    pub fn request_lines(&self) -> Vec<String> {
        self.state().log.iter().map(LoggedRequest::line).collect()
    }

    /// Forget logged requests.
    pub fn clear_log(&self) {
        self.state().log.clear();
    }

    /// Number of live records in the store.
    pub fn stored_records(&self) -> usize {
        self.state().store.len()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl State {
    fn respond(
        &mut self,
        method: &str,
        path: &str,
        body: Option<&Value>,
    ) -> (u16, String, Option<Duration>) {
        if let Some(pos) = self
            .overrides
            .iter()
            .position(|o| o.method == method && o.path == path && o.remaining != Some(0))
        {
            let o = &mut self.overrides[pos];
            if let Some(n) = o.remaining.as_mut() {
                *n -= 1;
            }
            return (o.status, o.body.clone(), o.delay);
        }

        if let Some((_, _, action)) = self
            .actions
            .iter()
            .find(|(m, p, _)| m == method && p == path)
        {
            let (status, reply) = action(&mut self.store, body.unwrap_or(&Value::Null));
            return (status, reply.to_string(), None);
        }

        let (status, reply) = self.store.handle(method, path, body);
        let reply = if status == 204 {
            String::new()
        } else {
            reply.to_string()
        };
        (status, reply, None)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
