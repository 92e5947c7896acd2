use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use solr_sync::client::SearchBackend;
use solr_sync::error::Result;
use solr_sync::index::SolrDocument;
use solr_sync::model::{Entity, EntityRef, EntityStore, Related, Value};
use solr_sync::search::SelectRequest;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: Arc<Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(Arc<Mutex<Vec<u8>>>);

impl Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[allow(dead_code)]
pub struct EnvGuard {
    key: String,
    prev: Option<String>,
}

#[allow(dead_code)]
impl EnvGuard {
    pub fn set(key: &str, val: impl AsRef<str>) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::set_var(key, val.as_ref()) };
        Self {
            key: key.to_string(),
            prev,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(&self.key, v) },
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}

/// Attribute bag standing in for an application model.
#[allow(dead_code)]
pub struct Record {
    type_name: String,
    pk: String,
    attrs: RefCell<HashMap<String, Value>>,
    assocs: RefCell<HashMap<String, Related>>,
}

#[allow(dead_code)]
impl Record {
    pub fn new(type_name: &str, pk: &str) -> Arc<Self> {
        Arc::new(Self {
            type_name: type_name.into(),
            pk: pk.into(),
            attrs: RefCell::default(),
            assocs: RefCell::default(),
        })
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) {
        self.attrs.borrow_mut().insert(name.into(), value.into());
    }

    pub fn relate(&self, association: &str, related: Related) {
        self.assocs.borrow_mut().insert(association.into(), related);
    }
}

impl Entity for Record {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn primary_key(&self) -> String {
        self.pk.clone()
    }

    fn read(&self, name: &str) -> Option<Value> {
        self.attrs.borrow().get(name).cloned()
    }

    fn related(&self, association: &str) -> Option<Related> {
        self.assocs.borrow().get(association).cloned()
    }
}

#[allow(dead_code)]
pub fn many(records: &[&Arc<Record>]) -> Related {
    Related::Many(records.iter().map(|r| (*r).clone() as EntityRef).collect())
}

#[allow(dead_code)]
pub fn one(record: &Arc<Record>) -> Related {
    Related::One(record.clone())
}

#[derive(Default)]
#[allow(dead_code)]
pub struct MemoryStore {
    rows: RefCell<Vec<EntityRef>>,
    pub fetches: RefCell<Vec<String>>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn insert(&self, entity: EntityRef) {
        self.rows.borrow_mut().push(entity);
    }
}

impl EntityStore for MemoryStore {
    fn find_by_ids(&self, type_name: &str, ids: &[String]) -> Result<Vec<EntityRef>> {
        self.fetches
            .borrow_mut()
            .push(format!("{type_name}:{}", ids.join(",")));
        Ok(self
            .rows
            .borrow()
            .iter()
            .filter(|e| e.type_name() == type_name && ids.contains(&e.primary_key()))
            .cloned()
            .collect())
    }

    fn find_page(&self, type_name: &str, offset: usize, limit: usize) -> Result<Vec<EntityRef>> {
        Ok(self
            .rows
            .borrow()
            .iter()
            .filter(|e| e.type_name() == type_name)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Records every call as a one-line string, e.g. `add Listing-1,Listing-2`.
#[derive(Default)]
#[allow(dead_code)]
pub struct RecordingBackend {
    calls: RefCell<Vec<String>>,
    added: RefCell<Vec<SolrDocument>>,
    responses: RefCell<VecDeque<String>>,
}

#[allow(dead_code)]
impl RecordingBackend {
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Every document sent so far, in order.
    pub fn added(&self) -> Vec<SolrDocument> {
        self.added.borrow().clone()
    }

    pub fn respond_with(&self, body: impl Into<String>) {
        self.responses.borrow_mut().push_back(body.into());
    }
}

impl SearchBackend for RecordingBackend {
    fn add(&self, docs: &[SolrDocument]) -> Result<()> {
        let ids: Vec<&str> = docs.iter().map(SolrDocument::id).collect();
        self.calls.borrow_mut().push(format!("add {}", ids.join(",")));
        self.added.borrow_mut().extend_from_slice(docs);
        Ok(())
    }

    fn delete(&self, ids: &[String]) -> Result<()> {
        self.calls.borrow_mut().push(format!("delete {}", ids.join(",")));
        Ok(())
    }

    fn delete_all(&self, query: Option<&str>) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("delete_all {}", query.unwrap_or("*:*")));
        Ok(())
    }

    fn select(&self, request: &SelectRequest) -> Result<String> {
        self.calls
            .borrow_mut()
            .push(format!("select {}", request.to_query_string()));
        Ok(self.responses.borrow_mut().pop_front().unwrap_or_else(|| {
            r#"{"response":{"numFound":0,"start":0,"docs":[]}}"#.to_string()
        }))
    }
}

/// One request as seen by [`StubServer`].
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct SeenRequest {
    pub method: String,
    pub target: String,
    pub content_type: Option<String>,
    pub body: String,
}

/// Minimal HTTP/1.1 responder on a loopback port. Each connection serves
/// one request and is closed; queued responses are used in order, then
/// `200` with an ok update body.
#[allow(dead_code)]
pub struct StubServer {
    pub port: u16,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    responses: Arc<Mutex<VecDeque<(u16, String)>>>,
}

#[allow(dead_code)]
pub const OK_UPDATE: &str =
    r#"<response><lst name="responseHeader"><int name="status">0</int><int name="QTime">1</int></lst></response>"#;

#[allow(dead_code)]
impl StubServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let port = listener.local_addr().expect("local addr").port();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let responses: Arc<Mutex<VecDeque<(u16, String)>>> = Arc::new(Mutex::new(VecDeque::new()));

        let (seen_t, responses_t) = (seen.clone(), responses.clone());
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let Some(request) = read_request(&mut stream) else {
                    continue;
                };
                let is_head = request.method == "HEAD";
                seen_t.lock().unwrap().push(request);
                let (status, body) = responses_t
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or((200, OK_UPDATE.to_string()));
                let head = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes());
                if !is_head {
                    let _ = stream.write_all(body.as_bytes());
                }
                let _ = stream.flush();
            }
        });

        Self {
            port,
            seen,
            responses,
        }
    }

    pub fn respond(&self, status: u16, body: impl Into<String>) {
        self.responses.lock().unwrap().push_back((status, body.into()));
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

fn read_request(stream: &mut std::net::TcpStream) -> Option<SeenRequest> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut content_length = 0usize;
    let mut content_type = None;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            } else if name.eq_ignore_ascii_case("content-type") {
                content_type = Some(value.to_string());
            }
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;
    Some(SeenRequest {
        method,
        target,
        content_type,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}
