//! Test doubles for the external collaborators: a toy-language
//! parser/extractor and an in-memory open-buffer store.
//!
//! The toy language is line-oriented:
//!   `def NAME`            function declared and defined here
//!   `type NAME`           type declared and defined here
//!   `member PARENT NAME`  method NAME inside type PARENT
//!   `ref NAME`            reference to NAME
//!   `call NAME`           call of NAME
//!   `dep FILE`            structural dependency on FILE (same dir)
//!   `fail`                the whole file fails to parse
//!   `badextract`          parse succeeds, extraction fails

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use symdex_api::{
    BufferStore, ExtractFailure, ExtractSink, Location, ParseFailure, ParsedUnit, Range, RoleFlags,
    SourceParser, SourceSnapshot, SymbolDecl, SymbolId, SymbolKind, Use,
};

pub fn toy_id(name: &str) -> SymbolId {
    SymbolId::of(&format!("toy:{name}"))
}

pub struct FakeParser {
    parsed: Mutex<Vec<PathBuf>>,
}

impl FakeParser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            parsed: Mutex::new(Vec::new()),
        })
    }

    pub fn parse_count(&self, path: &Path) -> usize {
        self.parsed
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_path() == path)
            .count()
    }

    pub fn total_parses(&self) -> usize {
        self.parsed.lock().unwrap().len()
    }
}

impl SourceParser for FakeParser {
    fn parse(&self, snapshot: &SourceSnapshot) -> Result<Box<dyn ParsedUnit>, ParseFailure> {
        if snapshot.content.lines().any(|l| l.trim() == "fail") {
            return Err(ParseFailure {
                path: snapshot.path.clone(),
                message: "toy syntax error".to_string(),
            });
        }
        self.parsed.lock().unwrap().push(snapshot.path.clone());
        Ok(Box::new(FakeUnit {
            path: snapshot.path.clone(),
            content: snapshot.content.to_string(),
        }))
    }
}

struct FakeUnit {
    path: PathBuf,
    content: String,
}

impl ParsedUnit for FakeUnit {
    fn path(&self) -> &Path {
        &self.path
    }

    fn extract(self: Box<Self>, sink: &mut dyn ExtractSink) -> Result<(), ExtractFailure> {
        let dir = self.path.parent().map(Path::to_path_buf).unwrap_or_default();

        for (line_no, line) in self.content.lines().enumerate() {
            let mut parts = line.split_whitespace();
            let Some(keyword) = parts.next() else { continue };
            match keyword {
                "def" | "type" => {
                    let Some(name) = parts.next() else { continue };
                    let kind = if keyword == "def" {
                        SymbolKind::Function
                    } else {
                        SymbolKind::Type
                    };
                    let loc = Location::new(&self.path, Range::new(line_no, 0, line_no, line.len()));
                    let mut decl =
                        SymbolDecl::new(toy_id(name), kind, name, format!("toy::{name}"), loc.clone());
                    decl.definition = Some(loc);
                    sink.on_symbol(decl);
                }
                "member" => {
                    let (Some(parent), Some(name)) = (parts.next(), parts.next()) else {
                        continue;
                    };
                    let loc = Location::new(&self.path, Range::new(line_no, 0, line_no, line.len()));
                    let mut decl = SymbolDecl::new(
                        toy_id(name),
                        SymbolKind::Method,
                        name,
                        format!("toy::{parent}::{name}"),
                        loc.clone(),
                    );
                    decl.parent = Some(toy_id(parent));
                    decl.definition = Some(loc);
                    sink.on_symbol(decl);
                }
                "ref" | "call" => {
                    let Some(name) = parts.next() else { continue };
                    let roles = if keyword == "call" {
                        RoleFlags::REFERENCE | RoleFlags::CALL
                    } else {
                        RoleFlags::REFERENCE
                    };
                    sink.on_use(Use::new(
                        toy_id(name),
                        Location::new(&self.path, Range::new(line_no, 5, line_no, line.len())),
                        roles,
                    ));
                }
                "dep" => {
                    if let Some(target) = parts.next() {
                        sink.on_dependency(dir.join(target));
                    }
                }
                "badextract" => {
                    return Err(ExtractFailure {
                        path: self.path.clone(),
                        message: "toy extraction error".to_string(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct SharedBuffers {
    overlays: Mutex<HashMap<PathBuf, Arc<str>>>,
}

impl SharedBuffers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self, path: &Path, content: &str) {
        self.overlays
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), Arc::from(content));
    }

    pub fn close(&self, path: &Path) {
        self.overlays.lock().unwrap().remove(path);
    }
}

impl BufferStore for SharedBuffers {
    fn overlay(&self, path: &Path) -> Option<Arc<str>> {
        self.overlays.lock().unwrap().get(path).cloned()
    }
}
