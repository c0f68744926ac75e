//! Transaction metadata keys understood by the editor's plugins

/// Set on every transaction appended by a plugin hook
pub const APPENDED_TRANSACTION: &str = "appendedTransaction";

/// Ask every enforcer to re-check the document even without content changes
pub const REFRESH: &str = "refresh";

/// A bibliography section was inserted; regenerate citations
pub const BIBLIOGRAPHY_INSERTED: &str = "bibliographyInserted";

/// The citation library changed outside the document
pub const LIBRARY_UPDATED: &str = "libraryUpdated";

/// Boolean: whether inconsistency decorations are shown
pub const SHOW_INCONSISTENCIES: &str = "inconsistency.showDecorations";

/// String change id (or null) selecting a suggestion explicitly
pub const SELECT_SUGGESTION: &str = "trackChanges.selectSuggestion";

/// `{ "query": string, "caseSensitive": bool }`
pub const FIND_QUERY: &str = "findReplace.query";

/// Index of the active match
pub const FIND_ACTIVE: &str = "findReplace.active";

/// Steps received from the collaboration server
pub const REMOTE: &str = "collab.remote";
