//! Scripted network and helpers shared by engine tests.

use crate::fetch::Network;
use stash_core::{Error, Request, Response};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use url::Url;

pub(crate) const ORIGIN: &str = "http://localhost:8080";

pub(crate) fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub(crate) fn get(path: &str) -> Request {
    Request::get(url(path))
}

#[derive(Clone)]
enum Script {
    Respond(Response),
    Reject,
}

#[derive(Clone)]
struct Route {
    script: Script,
    delay: Duration,
}

/// Network double: per-URL scripted responses, optional delays, an offline switch.
/// Unscripted URLs answer 404.
pub(crate) struct FakeNetwork {
    routes: Mutex<HashMap<String, Route>>,
    online: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub(crate) fn new() -> Self {
        Self { routes: Mutex::new(HashMap::new()), online: AtomicBool::new(true), calls: Mutex::new(Vec::new()) }
    }

    pub(crate) fn serve(&self, path: &str, body: &'static str) {
        self.serve_response(path, Response::new(200, body));
    }

    pub(crate) fn serve_response(&self, path: &str, response: Response) {
        self.set(path, Script::Respond(response));
    }

    pub(crate) fn reject(&self, path: &str) {
        self.set(path, Script::Reject);
    }

    pub(crate) fn delay(&self, path: &str, delay: Duration) {
        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .entry(url(path).to_string())
            .or_insert(Route { script: Script::Respond(Response::new(404, "")), delay });
        route.delay = delay;
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self, path: &str) -> usize {
        let target = url(path).to_string();
        self.calls.lock().unwrap().iter().filter(|c| **c == target).count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn set(&self, path: &str, script: Script) {
        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .entry(url(path).to_string())
            .or_insert(Route { script: script.clone(), delay: Duration::ZERO });
        route.script = script;
    }
}

#[async_trait::async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let target = request.url.to_string();
        self.calls.lock().unwrap().push(target.clone());

        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::NetworkFailure("offline".into()));
        }

        let route = self.routes.lock().unwrap().get(&target).cloned();
        let Some(route) = route else {
            return Ok(Response::new(404, "not found"));
        };

        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }

        match route.script {
            Script::Respond(response) => Ok(response),
            Script::Reject => Err(Error::NetworkFailure(format!("connection refused: {target}"))),
        }
    }
}
