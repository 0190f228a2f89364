// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! Vhost templates compiled into the binary and the writer that installs them.

use crate::config::Paths;
use crate::domain::DomainSet;
use crate::error::{Error, Result};
use crate::fs::{atomic_write, ensure_dir, path_to_str};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

const MAIN_TPL: &str = include_str!("../templates/nginx-main.tpl");
const PLAIN_TPL: &str = include_str!("../templates/nginx.tpl");
const SSL_TPL: &str = include_str!("../templates/nginx-ssl.tpl");
const SSL_FORCED_TPL: &str = include_str!("../templates/nginx-sslforced.tpl");

/// Which vhost layout to install for an app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// HTTP only.
    Plain,
    /// HTTP and HTTPS side by side.
    Ssl,
    /// HTTPS with HTTP redirecting to it.
    SslForced,
}

impl Variant {
    fn template(self) -> (&'static str, &'static str) {
        match self {
            Variant::Plain => ("nginx.tpl", PLAIN_TPL),
            Variant::Ssl => ("nginx-ssl.tpl", SSL_TPL),
            Variant::SslForced => ("nginx-sslforced.tpl", SSL_FORCED_TPL),
        }
    }
}

/// A template variable. `Disabled` renders as nothing and is false in `{% if %}`,
/// unlike an enabled empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Disabled,
}

impl Value {
    fn is_enabled(&self) -> bool {
        matches!(self, Value::Text(_))
    }
}

/// Values substituted into the vhost templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateData {
    pub appname: String,
    pub username: String,
    pub servername: String,
    pub serveralias: Value,
    pub webroot: String,
    pub userhome: String,
    pub sslpath: String,
    pub vhostdir: String,
}

impl TemplateData {
    /// The first domain becomes `server_name`'s primary entry; the rest become
    /// aliases. With fewer than two domains there is no alias field at all.
    pub fn new(paths: &Paths, app: &str, user: &str, domains: &DomainSet) -> Result<Self> {
        let (servername, serveralias) = match domains.as_slice() {
            [] => (String::new(), Value::Disabled),
            [only] => (only.clone(), Value::Disabled),
            [first, rest @ ..] => (first.clone(), Value::Text(rest.join(" "))),
        };

        Ok(Self {
            appname: app.to_string(),
            username: user.to_string(),
            servername,
            serveralias,
            webroot: path_to_str(&paths.webroot(user, app))?.to_string(),
            userhome: path_to_str(&paths.user_home(user))?.to_string(),
            sslpath: path_to_str(&paths.ssl_root)?.to_string(),
            vhostdir: path_to_str(&paths.vhosts_dir)?.to_string(),
        })
    }

    fn vars(&self) -> BTreeMap<&'static str, Value> {
        let text = |s: &str| Value::Text(s.to_string());
        BTreeMap::from([
            ("appname", text(&self.appname)),
            ("username", text(&self.username)),
            ("servername", text(&self.servername)),
            ("serveralias", self.serveralias.clone()),
            ("webroot", text(&self.webroot)),
            ("userhome", text(&self.userhome)),
            ("sslpath", text(&self.sslpath)),
            ("vhostdir", text(&self.vhostdir)),
        ])
    }
}

/// Render `source`, supporting `{{ name }}` and inline `{% if name %}...{% endif %}`.
pub fn render(
    template: &'static str,
    source: &str,
    vars: &BTreeMap<&'static str, Value>,
) -> Result<String> {
    let err = |reason: String| Error::Template { template, reason };
    let lookup = |name: &str| {
        vars.get(name)
            .ok_or_else(|| err(format!("unknown variable '{}'", name)))
    };

    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    loop {
        let next_var = rest.find("{{");
        let next_tag = rest.find("{%");
        let start = match (next_var, next_tag) {
            (None, None) => {
                out.push_str(rest);
                return Ok(out);
            }
            (Some(v), Some(t)) => v.min(t),
            (Some(v), None) => v,
            (None, Some(t)) => t,
        };
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        if rest.starts_with("{{") {
            let end = rest
                .find("}}")
                .ok_or_else(|| err("unterminated '{{'".into()))?;
            let name = rest[2..end].trim();
            if let Value::Text(text) = lookup(name)? {
                out.push_str(text);
            }
            rest = &rest[end + 2..];
            continue;
        }

        let end = rest
            .find("%}")
            .ok_or_else(|| err("unterminated '{%'".into()))?;
        let tag = rest[2..end].trim();
        rest = &rest[end + 2..];

        let name = match tag.strip_prefix("if ") {
            Some(name) => name.trim(),
            None => return Err(err(format!("unexpected tag '{}'", tag))),
        };
        let enabled = lookup(name)?.is_enabled();

        let (body, after) = split_at_endif(rest)
            .ok_or_else(|| err(format!("'if {}' has no matching endif", name)))?;
        if body.contains("{%") {
            return Err(err(format!("nested tags inside 'if {}'", name)));
        }
        if enabled {
            out.push_str(&render(template, body, vars)?);
        }
        rest = after;
    }
}

fn split_at_endif(input: &str) -> Option<(&str, &str)> {
    let mut search = 0;
    while let Some(pos) = input[search..].find("{%") {
        let start = search + pos;
        let end = start + input[start..].find("%}")?;
        if input[start + 2..end].trim() == "endif" {
            return Some((&input[..start], &input[end + 2..]));
        }
        search = end + 2;
    }
    None
}

/// Writes rendered templates into the nginx-sp vhost directory.
pub struct VhostWriter<'a> {
    paths: &'a Paths,
}

impl<'a> VhostWriter<'a> {
    pub fn new(paths: &'a Paths) -> Self {
        Self { paths }
    }

    pub fn render(&self, variant: Variant, data: &TemplateData) -> Result<String> {
        let (name, source) = variant.template();
        render(name, source, &data.vars())
    }

    pub fn render_main(&self) -> Result<String> {
        render("nginx-main.tpl", MAIN_TPL, &BTreeMap::new())
    }

    /// Render and install `variant` for `data.appname`. The plain variant
    /// also (re)writes the app's shared `main.conf`.
    pub fn write(&self, variant: Variant, data: &TemplateData) -> Result<PathBuf> {
        // Render everything before touching disk
        let vhost = self.render(variant, data)?;
        let main = match variant {
            Variant::Plain => Some(self.render_main()?),
            _ => None,
        };

        if let Some(main) = main {
            ensure_dir(&self.paths.vhost_include_dir(&data.appname))?;
            let main_path = self.paths.vhost_main_conf(&data.appname);
            atomic_write(&main_path, main.as_bytes())?;
            debug!(path = %main_path.display(), "Wrote shared main.conf");
        }

        let path = self.paths.vhost_conf(&data.appname);
        atomic_write(&path, vhost.as_bytes())?;
        info!(app = %data.appname, ?variant, path = %path.display(), "Wrote vhost");
        Ok(path)
    }

    pub fn write_plain(&self, data: &TemplateData) -> Result<PathBuf> {
        self.write(Variant::Plain, data)
    }

    pub fn write_ssl(&self, data: &TemplateData) -> Result<PathBuf> {
        self.write(Variant::Ssl, data)
    }

    pub fn write_ssl_forced(&self, data: &TemplateData) -> Result<PathBuf> {
        self.write(Variant::SslForced, data)
    }
}
