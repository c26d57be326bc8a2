//! Symbol Locator: the lookup engine
//!
//! Turns a [`SymbolQuery`] into definition and reference sites. Workspace
//! names are looked up with `workspace/symbol`; anything else is resolved
//! by importing it from a probe file and asking for its definition. Every
//! lookup is a short sequence of round trips on one session, so the
//! locator takes `&mut self` throughout.

use lsp_types::{SymbolKind, Uri};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Level, debug, info, warn};

use crate::backend::file_manager::FileManagerError;
use crate::backend::{BackendSessionError, BackendSessionTrait};
use crate::io::{FileSystemTrait, RealFileSystem};
use crate::log_timing;
use crate::lsp::LspClientTrait;
use crate::resolver::enrich::{
    DEFINITION_CONTEXT_RADIUS, context_lines, has_declaration_syntax, hover_text,
};
use crate::resolver::error::ResolveError;
use crate::resolver::normalize::{self, dedup_stable, location_key};
use crate::resolver::probe::{ProbeFile, is_probe_path};
use crate::resolver::query::SymbolQuery;
use crate::resolver::results::{DefinitionResult, OutlineEntry, ReferenceResult, SymbolMatch};
use crate::resolver::syntax::PythonSource;
use crate::resolver::translate::WorkspaceTranslator;
use crate::symbol::{FileLocation, FilePosition, Position, Symbol, uri_from_path};

/// A resolved definition site before it is shaped for the caller
#[derive(Debug, Clone)]
struct Candidate {
    /// Absolute path
    location: FileLocation,
    kind: Option<SymbolKind>,
    container_name: Option<String>,
}

impl From<Symbol> for Candidate {
    fn from(symbol: Symbol) -> Self {
        Self {
            location: symbol.location,
            kind: Some(symbol.kind),
            container_name: symbol.container_name,
        }
    }
}

pub struct SymbolLocator<S: BackendSessionTrait> {
    session: S,
    fs: Arc<dyn FileSystemTrait>,
    translator: WorkspaceTranslator,
}

impl<S: BackendSessionTrait> SymbolLocator<S> {
    pub fn new(session: S) -> Self {
        Self::with_file_system(session, Arc::new(RealFileSystem))
    }

    pub fn with_file_system(session: S, fs: Arc<dyn FileSystemTrait>) -> Self {
        let config = session.config();
        let mut translator = WorkspaceTranslator::new(config.workspace_root.clone());
        if let Some(interpreter) = &config.python_env {
            translator = translator.with_environment(interpreter);
        }
        Self {
            session,
            fs,
            translator,
        }
    }

    #[cfg(test)]
    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn workspace_root(&self) -> &Path {
        self.translator.root()
    }

    /// Close the underlying session
    pub async fn close(self) -> Result<(), BackendSessionError> {
        self.session.close().await
    }

    // ========================================================================
    // Caller-facing operations
    // ========================================================================

    /// Definition sites of `query`, optionally with hover text and
    /// declaration details
    pub async fn find_definition(
        &mut self,
        query: &SymbolQuery,
        enrich: bool,
    ) -> Result<Vec<DefinitionResult>, ResolveError> {
        let started = Instant::now();
        let candidates = self.resolve_definition(query).await?;

        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            results.push(self.describe_definition(query, candidate, enrich).await);
        }

        log_timing!(Level::DEBUG, "find_definition", started.elapsed());
        info!("{} resolved to {} definition(s)", query, results.len());
        Ok(results)
    }

    /// Every site referring to the definition of `query`, declaration
    /// included
    ///
    /// When the name resolves to several definitions the first one seeds
    /// the search.
    pub async fn find_references(
        &mut self,
        query: &SymbolQuery,
    ) -> Result<Vec<ReferenceResult>, ResolveError> {
        let started = Instant::now();
        let candidates = self.resolve_definition(query).await?;
        let Some(seed) = candidates.first() else {
            return Err(ResolveError::symbol_not_found(query, "no definition to search from"));
        };
        if candidates.len() > 1 {
            warn!(
                "{} has {} definitions; finding references of the first and discarding {}",
                query,
                candidates.len(),
                candidates.len() - 1
            );
        }

        let uri = self.target_uri(query, &seed.location.file_path).await?;
        let locations = self
            .session
            .client_mut()
            .text_document_references(uri, seed.location.range.start.into(), true)
            .await
            .map_err(|e| ResolveError::from_lsp(query, &e))?;

        let results: Vec<ReferenceResult> = normalize::reference_locations(locations)
            .into_iter()
            .map(|location| ReferenceResult {
                context: self.context(&location.file_path, location.range.start.line, 0),
                location: self.report_position(&location),
            })
            .collect();

        log_timing!(Level::DEBUG, "find_references", started.elapsed());
        info!("{} has {} reference(s)", query, results.len());
        Ok(results)
    }

    /// Free-form workspace symbol search
    pub async fn search_symbols(&mut self, query: &str) -> Result<Vec<SymbolMatch>, ResolveError> {
        let started = Instant::now();
        let response = self
            .session
            .client_mut()
            .workspace_symbols(query.to_string())
            .await
            .map_err(|e| ResolveError::from_lsp(query, &e))?;

        let matches: Vec<SymbolMatch> = normalize::workspace_symbols(response)
            .into_iter()
            .map(|symbol| SymbolMatch {
                location: self.report_position(&symbol.location),
                name: symbol.name,
                kind: symbol.kind,
                container_name: symbol.container_name,
            })
            .collect();

        log_timing!(Level::DEBUG, "search_symbols", started.elapsed());
        Ok(matches)
    }

    /// Every symbol declared in a workspace file, depth-first
    pub async fn document_outline(&mut self, path: &Path) -> Result<Vec<OutlineEntry>, ResolveError> {
        let started = Instant::now();
        let display = path.display().to_string();
        let absolute = self
            .translator
            .resolve_user_path(path)
            .map_err(|reason| ResolveError::InvalidQuery {
                query: display.clone(),
                reason,
            })?;

        let uri = self
            .session
            .ensure_file_ready(&absolute, self.fs.as_ref())
            .await
            .map_err(|e| ResolveError::from_file_manager(&display, &e))?;
        let response = self
            .session
            .client_mut()
            .text_document_document_symbol(uri)
            .await
            .map_err(|e| ResolveError::from_lsp(&display, &e))?;

        let entries: Vec<OutlineEntry> = normalize::document_symbols(response, &absolute)
            .into_iter()
            .map(|symbol| OutlineEntry {
                name: symbol.qualified_name(),
                kind: symbol.kind,
                location: self.report_position(&symbol.location),
            })
            .collect();

        log_timing!(Level::DEBUG, "document_outline", started.elapsed());
        Ok(entries)
    }

    // ========================================================================
    // Definition resolution
    // ========================================================================

    /// Deduplicated definition sites, in backend order; never empty
    async fn resolve_definition(
        &mut self,
        query: &SymbolQuery,
    ) -> Result<Vec<Candidate>, ResolveError> {
        query.validate()?;

        let candidates = match query {
            SymbolQuery::ByLocation {
                path,
                line,
                character,
            } => {
                self.resolve_at_location(query, path, Position::new(*line, *character))
                    .await?
            }
            SymbolQuery::ByFqn { module, qualpath } => {
                self.resolve_fqn(query, module, qualpath.as_deref()).await?
            }
        };

        Ok(dedup_stable(candidates, |candidate| {
            location_key(&candidate.location)
        }))
    }

    async fn resolve_at_location(
        &mut self,
        query: &SymbolQuery,
        path: &Path,
        position: Position,
    ) -> Result<Vec<Candidate>, ResolveError> {
        let absolute = self
            .translator
            .resolve_user_path(path)
            .map_err(|reason| ResolveError::invalid_query(query, reason))?;
        let source = self.fs.read_to_string(&absolute).map_err(|e| {
            ResolveError::invalid_query(query, format!("cannot read {}: {}", absolute.display(), e))
        })?;

        let line_count = source.split('\n').count();
        if position.line as usize >= line_count {
            return Err(ResolveError::invalid_query(
                query,
                format!("line {} is past the end of the file ({} lines)", position.line, line_count),
            ));
        }

        let uri = self
            .session
            .open_with_text(&absolute, source)
            .await
            .map_err(|e| ResolveError::from_file_manager(query, &e))?;
        let response = self
            .session
            .client_mut()
            .text_document_definition(uri, position.into())
            .await
            .map_err(|e| ResolveError::from_lsp(query, &e))?;

        let locations = normalize::definition_locations(response);
        if locations.is_empty() {
            return Err(ResolveError::symbol_not_found(
                query,
                "no definition at this location",
            ));
        }
        self.with_recovered_kinds(locations).await
    }

    async fn resolve_fqn(
        &mut self,
        query: &SymbolQuery,
        module: &str,
        qualpath: Option<&str>,
    ) -> Result<Vec<Candidate>, ResolveError> {
        let Some(module_file) = self
            .translator
            .workspace_module_file(module, self.fs.as_ref())
        else {
            debug!("{} is not a workspace module; probing", module);
            let locations = self.probe_definition(query, module, qualpath).await?;
            if locations.is_empty() {
                return Err(ResolveError::library_not_importable(
                    query,
                    format!("'{}' could not be imported in the configured environment", module),
                ));
            }
            return self.probe_candidates(qualpath, locations).await;
        };

        debug!("{} is a workspace module at {}", module, module_file.display());
        let found = self
            .search_workspace(query, module, qualpath, &module_file)
            .await?;
        if !found.is_empty() {
            return Ok(found);
        }

        debug!("Workspace search found nothing for {}; probing", query);
        let locations = self.probe_definition(query, module, qualpath).await?;
        if locations.is_empty() {
            return Err(ResolveError::symbol_not_found(
                query,
                format!("no definition in {}", self.translator.display_path(&module_file).display()),
            ));
        }
        self.probe_candidates(qualpath, locations).await
    }

    /// Exact `workspace/symbol` matches inside the module's file
    async fn search_workspace(
        &mut self,
        query: &SymbolQuery,
        module: &str,
        qualpath: Option<&str>,
        module_file: &Path,
    ) -> Result<Vec<Candidate>, ResolveError> {
        let Some(qualpath) = qualpath else {
            let last_segment = module.rsplit('.').next().unwrap_or(module);
            let symbols = self.workspace_symbols(query, last_segment).await?;
            return Ok(symbols
                .into_iter()
                .filter(|symbol| {
                    symbol.kind == SymbolKind::MODULE && symbol.location.file_path == module_file
                })
                .map(Candidate::from)
                .collect());
        };

        let last_segment = qualpath.rsplit('.').next().unwrap_or(qualpath);
        let mut searches = vec![qualpath];
        if last_segment != qualpath {
            searches.push(last_segment);
        }

        for search in searches {
            let matched: Vec<Candidate> = self
                .workspace_symbols(query, search)
                .await?
                .into_iter()
                .filter(|symbol| normalize::matches_qualpath(symbol, module, qualpath, module_file))
                .map(Candidate::from)
                .collect();
            if !matched.is_empty() {
                return Ok(matched);
            }
            debug!("No exact workspace match for '{}' with query '{}'", qualpath, search);
        }
        Ok(Vec::new())
    }

    async fn workspace_symbols(
        &mut self,
        query: &SymbolQuery,
        search: &str,
    ) -> Result<Vec<Symbol>, ResolveError> {
        let response = self
            .session
            .client_mut()
            .workspace_symbols(search.to_string())
            .await
            .map_err(|e| ResolveError::from_lsp(query, &e))?;
        Ok(normalize::workspace_symbols(response))
    }

    /// Definition sites of `module[.qualpath]` as seen from a probe import
    ///
    /// The probe is closed in the server and deleted on every exit path.
    async fn probe_definition(
        &mut self,
        query: &SymbolQuery,
        module: &str,
        qualpath: Option<&str>,
    ) -> Result<Vec<FileLocation>, ResolveError> {
        let probe_dir = self.session.config().probe_dir.clone();
        let probe = ProbeFile::create(&probe_dir, Arc::clone(&self.fs), module, qualpath)
            .map_err(|e| {
                ResolveError::backend_unavailable(
                    query,
                    format!("cannot write probe file in {}: {}", probe_dir.display(), e),
                )
            })?;

        let outcome = self.ask_probe(query, &probe).await;

        if let Err(e) = self.session.close_file(probe.path()).await {
            warn!("Failed to close probe {}: {}", probe.path().display(), e);
        }
        let probe_path = probe.path().to_path_buf();
        if let Err(e) = probe.remove() {
            warn!("Failed to remove probe {}: {}", probe_path.display(), e);
        }

        outcome
    }

    async fn ask_probe(
        &mut self,
        query: &SymbolQuery,
        probe: &ProbeFile,
    ) -> Result<Vec<FileLocation>, ResolveError> {
        let uri = self
            .session
            .open_with_text(probe.path(), probe.source().to_string())
            .await
            .map_err(|e| match &e {
                FileManagerError::Lsp(lsp) => ResolveError::from_lsp(query, lsp),
                other => ResolveError::backend_unavailable(query, other.to_string()),
            })?;
        let response = self
            .session
            .client_mut()
            .text_document_definition(uri, probe.cursor().into())
            .await
            .map_err(|e| ResolveError::from_lsp(query, &e))?;
        Ok(normalize::definition_locations(response))
    }

    async fn probe_candidates(
        &mut self,
        qualpath: Option<&str>,
        locations: Vec<FileLocation>,
    ) -> Result<Vec<Candidate>, ResolveError> {
        if qualpath.is_none() {
            return Ok(locations
                .into_iter()
                .map(|location| Candidate {
                    location,
                    kind: Some(SymbolKind::MODULE),
                    container_name: None,
                })
                .collect());
        }
        self.with_recovered_kinds(locations).await
    }

    async fn with_recovered_kinds(
        &mut self,
        locations: Vec<FileLocation>,
    ) -> Result<Vec<Candidate>, ResolveError> {
        let mut candidates = Vec::with_capacity(locations.len());
        for location in locations {
            let (kind, container_name) = self.recover_kind(&location).await;
            candidates.push(Candidate {
                location,
                kind,
                container_name,
            });
        }
        Ok(candidates)
    }

    /// Kind and container of the innermost document symbol at `location`
    ///
    /// A failed lookup leaves both unset; the definition itself stands.
    async fn recover_kind(&mut self, location: &FileLocation) -> (Option<SymbolKind>, Option<String>) {
        let file = location.file_path.display().to_string();
        let uri = match self.target_uri(&file, &location.file_path).await {
            Ok(uri) => uri,
            Err(e) => {
                warn!("Cannot recover symbol kind: {}", e);
                return (None, None);
            }
        };

        let response = match self
            .session
            .client_mut()
            .text_document_document_symbol(uri)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Cannot recover symbol kind in {}: {}", file, e);
                return (None, None);
            }
        };

        let symbols = normalize::document_symbols(response, &location.file_path);
        match normalize::symbol_at(&symbols, location.range.start) {
            Some(symbol) => (Some(symbol.kind), symbol.container_name.clone()),
            None => {
                debug!("No document symbol at {}", location.start());
                (None, None)
            }
        }
    }

    /// URI for a request about a definition file
    ///
    /// Workspace files are synchronized first; library files are left for
    /// the server to read from disk.
    async fn target_uri(&mut self, query: impl ToString, path: &Path) -> Result<Uri, ResolveError> {
        if self.translator.is_in_workspace(path, self.fs.as_ref()) && !is_probe_path(path) {
            match self.session.ensure_file_ready(path, self.fs.as_ref()).await {
                Ok(uri) => return Ok(uri),
                Err(FileManagerError::Lsp(e)) => return Err(ResolveError::from_lsp(query, &e)),
                Err(e) => warn!("Cannot sync {}: {}; querying by URI", path.display(), e),
            }
        }
        uri_from_path(path).map_err(|e| ResolveError::backend_unavailable(query, e.to_string()))
    }

    // ========================================================================
    // Enrichment
    // ========================================================================

    async fn describe_definition(
        &mut self,
        query: &SymbolQuery,
        candidate: Candidate,
        enrich: bool,
    ) -> DefinitionResult {
        let path = candidate.location.file_path.clone();
        let start = candidate.location.range.start;
        let source = self.fs.read_to_string(&path).ok();

        let mut result = DefinitionResult::new(
            self.report_position(&candidate.location),
            candidate.kind,
            candidate.container_name,
        );
        result.context = source
            .as_deref()
            .and_then(|source| context_lines(source, start.line, DEFINITION_CONTEXT_RADIUS));

        if !enrich {
            return result;
        }

        match self.hover(query, &path, start).await {
            Ok(text) => result.hover_text = text,
            Err(e) => warn!("{}", e),
        }

        if self.translator.is_in_workspace(&path, self.fs.as_ref())
            && has_declaration_syntax(candidate.kind)
        {
            let details = source
                .as_deref()
                .ok_or_else(|| format!("cannot read {}", path.display()))
                .and_then(|source| {
                    let parsed = PythonSource::parse(source).map_err(|e| e.to_string())?;
                    parsed.definition_at(start).map_err(|e| e.to_string())
                });
            match details {
                Ok(details) => {
                    result.signature = Some(details.signature);
                    result.declared_methods = details.declared_methods;
                    result.full_range = Some(details.full_range);
                    result.source_text = Some(details.source_text);
                }
                Err(reason) => warn!("{}", ResolveError::enrichment_unavailable(query, reason)),
            }
        }

        result
    }

    async fn hover(
        &mut self,
        query: &SymbolQuery,
        path: &Path,
        position: Position,
    ) -> Result<Option<String>, ResolveError> {
        let uri = self
            .target_uri(query, path)
            .await
            .map_err(|e| ResolveError::enrichment_unavailable(query, e.to_string()))?;
        let hover = self
            .session
            .client_mut()
            .text_document_hover(uri, position.into())
            .await
            .map_err(|e| ResolveError::enrichment_unavailable(query, format!("hover failed: {}", e)))?;
        Ok(hover.and_then(hover_text))
    }

    // ========================================================================
    // Reporting helpers
    // ========================================================================

    fn report_position(&self, location: &FileLocation) -> FilePosition {
        FilePosition {
            file_path: self.translator.display_path(&location.file_path),
            position: location.range.start,
        }
    }

    fn context(&self, path: &Path, line: u32, radius: u32) -> Option<String> {
        let source = self.fs.read_to_string(path).ok()?;
        context_lines(&source, line, radius)
    }
}

// ============================================================================
// Tests
// ============================================================================
