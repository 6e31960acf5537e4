use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Method, Status};
use rocket::{Request, Response};

pub struct Cors {
    pub allow_origins: Vec<String>,
    pub allow_methods: &'static [&'static str],
    // ingress allowed user-set headers
    pub allow_headers: &'static [&'static str],
}

impl Cors {
    pub fn new(allow_origins: &[String]) -> Cors {
        Cors {
            allow_origins: allow_origins.to_vec(),
            allow_methods: &["GET", "POST", "PUT", "DELETE", "OPTIONS"],
            allow_headers: &["Content-Type", "Authorization"],
        }
    }

    fn allows(&self, origin: &str) -> bool {
        self.allow_origins.iter().any(|o| o == "*" || o == origin)
    }
}

fn is_preflight(req: &Request<'_>) -> bool {
    req.method() == Method::Options && req.headers().contains("Access-Control-Request-Method")
}

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let origin = match req.headers().get_one("Origin") {
            Some(origin) => origin,
            None => return,
        };
        if !self.allows(origin) {
            return;
        }

        res.set_raw_header("Access-Control-Allow-Origin", origin.to_owned());
        res.set_raw_header("Vary", "Origin");
        if is_preflight(req) {
            res.set_raw_header("Access-Control-Allow-Methods", self.allow_methods.join(", "));
            res.set_raw_header("Access-Control-Allow-Headers", self.allow_headers.join(", "));
        }
    }
}

/// Answers preflight requests for every API path; the fairing adds the
/// headers.
#[rocket::options("/<_..>")]
pub fn preflight() -> Status {
    Status::NoContent
}
