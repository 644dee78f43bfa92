//! File-backed SQL template resolution.

use crate::error::{JinjaError, JinjaResult};
use crate::functions::{self, FUNCTION_NAMES};
use minijinja::value::Value;
use minijinja::{path_loader, AutoEscape, Environment, ErrorKind, Template, UndefinedBehavior};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Variables passed to a template render.
pub type TemplateVars = BTreeMap<String, serde_json::Value>;

const TEMPLATE_EXTENSION: &str = ".sql";

/// Name used in errors for templates rendered from a string.
const INLINE_TEMPLATE: &str = "<inline>";

/// Resolves logical template names to `<sql_dir>/<name>.sql` and renders them.
///
/// Every render builds a fresh environment and reads the file from disk, so
/// edits are picked up immediately.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    sql_dir: PathBuf,
}

impl TemplateResolver {
    /// Create a resolver rooted at `sql_dir`.
    ///
    /// A missing directory is only logged here; rendering fails later with
    /// [`JinjaError::SqlDirNotFound`].
    pub fn new(sql_dir: impl Into<PathBuf>) -> Self {
        let sql_dir = sql_dir.into();
        if !sql_dir.is_dir() {
            log::warn!(
                "SQL template directory {} does not exist",
                sql_dir.display()
            );
        }
        Self { sql_dir }
    }

    pub fn sql_dir(&self) -> &Path {
        &self.sql_dir
    }

    /// Path the template `name` resolves to. The `.sql` suffix is optional.
    pub fn template_path(&self, name: &str) -> PathBuf {
        self.sql_dir.join(template_file_name(name))
    }

    /// Render the template `name` with `vars`.
    pub fn render(&self, name: &str, vars: &TemplateVars) -> JinjaResult<String> {
        self.render_with(name, vars)
    }

    /// Render the template `name` with any serializable context.
    pub fn render_with<S: Serialize>(&self, name: &str, ctx: S) -> JinjaResult<String> {
        if !self.sql_dir.is_dir() {
            return Err(JinjaError::SqlDirNotFound {
                path: self.sql_dir.display().to_string(),
            });
        }

        let file_name = template_file_name(name);
        let path = self.sql_dir.join(&file_name);
        let not_found = || JinjaError::TemplateNotFound {
            name: name.to_string(),
            dir: self.sql_dir.display().to_string(),
        };

        // path_loader refuses to leave the directory; fail the same way here
        if Path::new(&file_name)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(not_found());
        }
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(not_found()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => {
                return Err(JinjaError::Io {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        }

        log::debug!("Rendering template {}", path.display());

        let mut env = sql_environment();
        env.set_loader(path_loader(&self.sql_dir));
        let ctx = Value::from_serialize(&ctx);

        let template = env.get_template(&file_name).map_err(|e| {
            if e.kind() == ErrorKind::TemplateNotFound {
                not_found()
            } else {
                render_error(&file_name, &e)
            }
        })?;
        template
            .render(&ctx)
            .map_err(|e| convert_error(e, &env, &file_name, &template, &ctx))
    }
}

/// Render an in-memory template with the same settings as file templates.
pub fn render_str<S: Serialize>(source: &str, ctx: S) -> JinjaResult<String> {
    let mut env = sql_environment();
    let ctx = Value::from_serialize(&ctx);
    env.add_template(INLINE_TEMPLATE, source)
        .map_err(|e| render_error(INLINE_TEMPLATE, &e))?;
    let template = env
        .get_template(INLINE_TEMPLATE)
        .map_err(|e| render_error(INLINE_TEMPLATE, &e))?;
    template
        .render(&ctx)
        .map_err(|e| convert_error(e, &env, INLINE_TEMPLATE, &template, &ctx))
}

fn sql_environment<'source>() -> Environment<'source> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    functions::register(&mut env);
    env
}

fn template_file_name(name: &str) -> String {
    if name.ends_with(TEMPLATE_EXTENSION) {
        name.to_string()
    } else {
        format!("{name}{TEMPLATE_EXTENSION}")
    }
}

/// Name the undefined value behind a strict-mode error.
///
/// The template that raised it (an include, possibly) is searched first,
/// then the template being rendered. Attribute paths are walked so a
/// missing field reports as `user.nme`.
fn convert_error(
    err: minijinja::Error,
    env: &Environment<'_>,
    template_name: &str,
    template: &Template<'_, '_>,
    ctx: &Value,
) -> JinjaError {
    if err.kind() != ErrorKind::UndefinedError {
        return render_error(template_name, &err);
    }

    let origin = err
        .name()
        .filter(|name| *name != template.name())
        .and_then(|name| env.get_template(name).ok());
    let mut candidates = origin
        .as_ref()
        .map(|t| undefined_paths(t, ctx))
        .unwrap_or_default();
    if candidates.is_empty() {
        candidates = undefined_paths(template, ctx);
    }

    let name = match candidates.into_iter().next() {
        Some(name) => name,
        None => err
            .detail()
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string()),
    };
    JinjaError::UndefinedVariable {
        name,
        template: template_name.to_string(),
    }
}

/// Variable paths of `template` that do not resolve in `ctx`, sorted.
fn undefined_paths(template: &Template<'_, '_>, ctx: &Value) -> Vec<String> {
    let mut paths: Vec<String> = template
        .undeclared_variables(true)
        .into_iter()
        .filter(|path| {
            let root = path.split('.').next().unwrap_or_default();
            !FUNCTION_NAMES.contains(&root)
        })
        .filter_map(|path| first_undefined(&path, ctx))
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

/// Prefix of `path` up to the first segment that is undefined in `ctx`.
fn first_undefined(path: &str, ctx: &Value) -> Option<String> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut value = ctx.clone();
    for (i, segment) in segments.iter().enumerate() {
        value = value.get_attr(segment).unwrap_or(Value::UNDEFINED);
        if value.is_undefined() {
            return Some(segments[..=i].join("."));
        }
    }
    None
}

fn render_error(template_name: &str, err: &minijinja::Error) -> JinjaError {
    let mut message = err.to_string();
    if let Some(detail) = err.detail() {
        if !message.contains(detail) {
            message = format!("{message}: {detail}");
        }
    }
    JinjaError::RenderError {
        template: template_name.to_string(),
        message,
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
