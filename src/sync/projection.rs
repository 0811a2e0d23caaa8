use crate::market::{Folder, MarketState, Symbol, SymbolKey};

/// Observer-facing view of a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolView {
    key: SymbolKey,
    label: String,
    active: bool,
}

impl SymbolView {
    fn new(symbol: &Symbol) -> Self {
        Self {
            key: symbol.key(),
            label: symbol.to_string(),
            active: symbol.active(),
        }
    }

    pub fn key(&self) -> &SymbolKey {
        &self.key
    }

    /// Returns the display label, `"{security} {market} {name}"`.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn active(&self) -> bool {
        self.active
    }
}

/// Observer-facing view of a folder and its sub-folders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderView {
    name: String,
    symbols: Vec<SymbolView>,
    folders: Vec<FolderView>,
    symbol_count: usize,
}

impl FolderView {
    fn new(folder: &Folder) -> Self {
        Self {
            name: folder.name().to_string(),
            symbols: sorted_views(folder.symbols()),
            folders: folder.folders().iter().map(FolderView::new).collect(),
            symbol_count: folder.symbol_count(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbols(&self) -> &[SymbolView] {
        &self.symbols
    }

    pub fn folders(&self) -> &[FolderView] {
        &self.folders
    }

    /// Number of symbols in this folder and its sub-folders.
    pub fn symbol_count(&self) -> usize {
        self.symbol_count
    }
}

/// Child collections of a [`MarketState`], rebuilt at each synchronization point.
///
/// The projection published together with a market state is always built from that same state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketProjection {
    symbols: Vec<SymbolView>,
    folders: Vec<FolderView>,
    active_symbol_count: usize,
}

impl MarketProjection {
    pub fn from_state(state: &MarketState) -> Self {
        Self {
            symbols: sorted_views(state.symbols()),
            folders: state.folders().iter().map(FolderView::new).collect(),
            active_symbol_count: state.active_symbol_count(),
        }
    }

    /// Returns the symbol views, sorted by name, market and security kind.
    pub fn symbols(&self) -> &[SymbolView] {
        &self.symbols
    }

    pub fn folders(&self) -> &[FolderView] {
        &self.folders
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn active_symbol_count(&self) -> usize {
        self.active_symbol_count
    }

    pub fn find(&self, key: &SymbolKey) -> Option<&SymbolView> {
        self.symbols
            .binary_search_by(|view| view.key.cmp(key))
            .ok()
            .map(|idx| &self.symbols[idx])
    }
}

fn sorted_views(symbols: &[Symbol]) -> Vec<SymbolView> {
    let mut views: Vec<SymbolView> = symbols.iter().map(SymbolView::new).collect();
    views.sort_by(|a, b| a.key.cmp(&b.key));
    views
}

#[cfg(test)]
mod tests {
    use crate::market::SecurityType;

    use super::*;

    fn equity(name: &str) -> Symbol {
        Symbol::new(name, "usa", SecurityType::Equity)
    }

    #[test]
    fn projection_sorts_symbols_and_counts_active() {
        let state = MarketState::new("m", "p")
            .with_symbol(equity("msft"))
            .and_then(|m| m.with_symbol(equity("AAPL").with_active(false)))
            .and_then(|m| m.with_symbol(equity("ibm")))
            .expect("valid market");

        let projection = MarketProjection::from_state(&state);

        let labels: Vec<&str> = projection
            .symbols()
            .iter()
            .map(SymbolView::label)
            .collect();
        assert_eq!(
            labels,
            vec!["Equity usa AAPL", "Equity usa ibm", "Equity usa msft"]
        );
        assert_eq!(projection.symbol_count(), 3);
        assert_eq!(projection.active_symbol_count(), 2);

        let aapl = projection
            .find(&SymbolKey::new("aapl", "usa", SecurityType::Equity))
            .expect("aapl projected");
        assert!(!aapl.active());
        assert!(
            projection
                .find(&SymbolKey::new("goog", "usa", SecurityType::Equity))
                .is_none()
        );
    }

    #[test]
    fn projection_mirrors_nested_folders() {
        let inner = Folder::new("inner")
            .with_symbol(equity("b"))
            .expect("valid folder");
        let outer = Folder::new("outer")
            .with_symbol(equity("c"))
            .and_then(|f| f.with_symbol(equity("a")))
            .and_then(|f| f.with_folder(inner))
            .expect("valid folder");

        let state = MarketState::new("m", "p")
            .with_folder(outer)
            .expect("valid market");

        let projection = MarketProjection::from_state(&state);

        assert_eq!(projection.symbol_count(), 0);
        assert_eq!(projection.folders().len(), 1);

        let outer = &projection.folders()[0];
        assert_eq!(outer.name(), "outer");
        assert_eq!(outer.symbol_count(), 3);
        assert_eq!(outer.symbols()[0].label(), "Equity usa a");
        assert_eq!(outer.folders()[0].name(), "inner");
        assert_eq!(outer.folders()[0].symbol_count(), 1);
    }

    #[test]
    fn empty_state_projects_to_default() {
        let projection = MarketProjection::from_state(&MarketState::new("m", "p"));
        assert_eq!(projection, MarketProjection::default());
    }
}
