//! Host module objects backing [`HostModule`](crate::HostModule).

use std::path::{Component, Path, PathBuf};

use {
    rquickjs::{
        Ctx, Exception, Object,
        function::{Func, Opt, Rest},
    },
    tracing::{debug, error, info, warn},
};

use crate::{capabilities::HostModule, convert::display};

pub(crate) fn module_object<'js>(ctx: &Ctx<'js>, module: HostModule) -> rquickjs::Result<Object<'js>> {
    match module {
        HostModule::Console => console(ctx),
        HostModule::Fs => fs(ctx),
        HostModule::Path => path(ctx),
        HostModule::Process => process(ctx),
    }
}

fn line(args: &Rest<rquickjs::Value<'_>>) -> String {
    args.0.iter().map(display).collect::<Vec<_>>().join(" ")
}

fn console<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
    let console = Object::new(ctx.clone())?;
    console.set(
        "log",
        Func::from(|args: Rest<rquickjs::Value>| info!(target: "pjman::script", "{}", line(&args))),
    )?;
    console.set(
        "info",
        Func::from(|args: Rest<rquickjs::Value>| info!(target: "pjman::script", "{}", line(&args))),
    )?;
    console.set(
        "warn",
        Func::from(|args: Rest<rquickjs::Value>| warn!(target: "pjman::script", "{}", line(&args))),
    )?;
    console.set(
        "error",
        Func::from(|args: Rest<rquickjs::Value>| error!(target: "pjman::script", "{}", line(&args))),
    )?;
    console.set(
        "debug",
        Func::from(|args: Rest<rquickjs::Value>| debug!(target: "pjman::script", "{}", line(&args))),
    )?;
    Ok(console)
}

fn io_error(ctx: &Ctx<'_>, op: &str, path: &str, err: &std::io::Error) -> rquickjs::Error {
    Exception::throw_message(ctx, &format!("{op} '{path}': {err}"))
}

fn fs<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
    let fs = Object::new(ctx.clone())?;
    fs.set(
        "readFile",
        Func::from(|ctx: Ctx<'_>, path: String| -> rquickjs::Result<String> {
            std::fs::read_to_string(&path).map_err(|e| io_error(&ctx, "readFile", &path, &e))
        }),
    )?;
    fs.set(
        "writeFile",
        Func::from(|ctx: Ctx<'_>, path: String, data: String| -> rquickjs::Result<()> {
            std::fs::write(&path, data).map_err(|e| io_error(&ctx, "writeFile", &path, &e))
        }),
    )?;
    fs.set(
        "appendFile",
        Func::from(|ctx: Ctx<'_>, path: String, data: String| -> rquickjs::Result<()> {
            use std::io::Write;
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .and_then(|mut file| file.write_all(data.as_bytes()))
                .map_err(|e| io_error(&ctx, "appendFile", &path, &e))
        }),
    )?;
    fs.set(
        "exists",
        Func::from(|path: String| Path::new(&path).exists()),
    )?;
    fs.set(
        "unlink",
        Func::from(|ctx: Ctx<'_>, path: String| -> rquickjs::Result<()> {
            std::fs::remove_file(&path).map_err(|e| io_error(&ctx, "unlink", &path, &e))
        }),
    )?;
    fs.set(
        "mkdir",
        Func::from(|ctx: Ctx<'_>, path: String| -> rquickjs::Result<()> {
            std::fs::create_dir_all(&path).map_err(|e| io_error(&ctx, "mkdir", &path, &e))
        }),
    )?;
    fs.set(
        "readdir",
        Func::from(|ctx: Ctx<'_>, path: String| -> rquickjs::Result<Vec<String>> {
            let entries = std::fs::read_dir(&path).map_err(|e| io_error(&ctx, "readdir", &path, &e))?;
            let mut names = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| io_error(&ctx, "readdir", &path, &e))?;
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
            names.sort();
            Ok(names)
        }),
    )?;
    fs.set(
        "copyFile",
        Func::from(|ctx: Ctx<'_>, from: String, to: String| -> rquickjs::Result<()> {
            std::fs::copy(&from, &to)
                .map(drop)
                .map_err(|e| io_error(&ctx, "copyFile", &from, &e))
        }),
    )?;
    Ok(fs)
}

/// Lexically collapse `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

fn join(parts: &[String]) -> String {
    let joined: PathBuf = parts.iter().filter(|p| !p.is_empty()).collect();
    normalize(&joined).to_string_lossy().into_owned()
}

fn resolve(parts: &[String]) -> String {
    let mut resolved = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    for part in parts.iter().filter(|p| !p.is_empty()) {
        // An absolute segment replaces everything before it.
        resolved.push(part);
    }
    normalize(&resolved).to_string_lossy().into_owned()
}

fn basename(path: &str, ext: Option<&str>) -> String {
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match ext {
        Some(ext) if !ext.is_empty() && name != ext => {
            name.strip_suffix(ext).map(str::to_string).unwrap_or(name)
        },
        _ => name,
    }
}

fn dirname(path: &str) -> String {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_string_lossy().into_owned(),
        Some(_) => ".".to_string(),
        None if path.starts_with('/') => "/".to_string(),
        None => ".".to_string(),
    }
}

fn extname(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

fn path<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
    let path = Object::new(ctx.clone())?;
    path.set("sep", std::path::MAIN_SEPARATOR.to_string())?;
    path.set("join", Func::from(|parts: Rest<String>| join(&parts.0)))?;
    path.set("resolve", Func::from(|parts: Rest<String>| resolve(&parts.0)))?;
    path.set(
        "basename",
        Func::from(|p: String, ext: Opt<String>| basename(&p, ext.0.as_deref())),
    )?;
    path.set("dirname", Func::from(|p: String| dirname(&p)))?;
    path.set("extname", Func::from(|p: String| extname(&p)))?;
    Ok(path)
}

fn process<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
    let process = Object::new(ctx.clone())?;
    process.set(
        "cwd",
        Func::from(|ctx: Ctx<'_>| -> rquickjs::Result<String> {
            std::env::current_dir()
                .map(|dir| dir.to_string_lossy().into_owned())
                .map_err(|e| io_error(&ctx, "cwd", ".", &e))
        }),
    )?;
    let env = Object::new(ctx.clone())?;
    for (key, value) in std::env::vars() {
        env.set(key.as_str(), value)?;
    }
    process.set("env", env)?;
    Ok(process)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn strings(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| (*p).to_string()).collect()
    }

    #[test]
    fn join_collapses_dots() {
        assert_eq!(join(&strings(&["a", "./b", "../c", "d.js"])), "a/c/d.js");
        assert_eq!(join(&strings(&["", ""])), ".");
        assert_eq!(join(&strings(&["..", "x"])), "../x");
    }

    #[test]
    fn resolve_is_absolute() {
        assert!(Path::new(&resolve(&strings(&["x"]))).is_absolute());
        assert_eq!(resolve(&strings(&["/tmp", "a", "..", "b"])), "/tmp/b");
        assert_eq!(resolve(&strings(&["ignored", "/abs"])), "/abs");
    }

    #[test]
    fn name_helpers() {
        assert_eq!(basename("/a/b/c.txt", None), "c.txt");
        assert_eq!(basename("/a/b/c.txt", Some(".txt")), "c");
        assert_eq!(dirname("/a/b/c.txt"), "/a/b");
        assert_eq!(dirname("c.txt"), ".");
        assert_eq!(dirname("/"), "/");
        assert_eq!(extname("archive.tar.gz"), ".gz");
        assert_eq!(extname("Makefile"), "");
    }
}
