//! Built-in formatting rules

mod copyright;
mod unnecessary_imports;
mod xml_copyright;

pub use copyright::{CommentStyle, CopyrightHeaderRule};
pub use unnecessary_imports::{find_unnecessary_imports, UnnecessaryImportsRule};
pub use xml_copyright::XmlCopyrightHeaderRule;

use crate::rule::{CatalogError, FormattingRule, RuleCatalog, RuleClass, RuleDescriptor};
use crate::syntax::Language;

pub const COPYRIGHT_HEADER: &str = "CopyrightHeader";
pub const XML_COPYRIGHT_HEADER: &str = "XmlCopyrightHeader";
pub const UNNECESSARY_IMPORTS: &str = "UnnecessaryImports";

/// Register the built-in rules into a catalog
pub fn register_builtin_rules(catalog: &mut RuleCatalog) -> Result<(), CatalogError> {
    catalog.register(
        RuleDescriptor::new(XML_COPYRIGHT_HEADER, RuleClass::Syntax)
            .with_description("Remove XML based copyright headers")
            .with_order(1)
            .with_languages(&[Language::CSharp]),
        |_| FormattingRule::Syntax(Box::new(XmlCopyrightHeaderRule)),
    )?;

    catalog.register(
        RuleDescriptor::new(COPYRIGHT_HEADER, RuleClass::Syntax)
            .with_description("Insert the copyright header into every file")
            .with_order(2),
        |options| {
            FormattingRule::Syntax(Box::new(CopyrightHeaderRule::new(
                &options.copyright_header,
            )))
        },
    )?;

    catalog.register(
        RuleDescriptor::new(UNNECESSARY_IMPORTS, RuleClass::LocalSemantic)
            .with_description("Remove duplicate imports and unused import aliases")
            .with_order(1),
        |_| FormattingRule::LocalSemantic(Box::new(UnnecessaryImportsRule)),
    )?;

    Ok(())
}

/// Catalog holding every built-in rule
pub fn builtin_catalog() -> RuleCatalog {
    let mut catalog = RuleCatalog::new();
    if let Err(e) = register_builtin_rules(&mut catalog) {
        log::error!("Failed to register built-in rules: {}", e);
    }
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::ToggleMap;

    #[test]
    fn test_builtin_catalog() {
        let catalog = builtin_catalog();
        assert_eq!(catalog.len(), 3);

        let toggles = ToggleMap::from_catalog(&catalog);
        let syntax: Vec<_> = catalog
            .ordered_enabled(RuleClass::Syntax, &toggles)
            .iter()
            .map(|e| e.descriptor.name.as_str())
            .collect();
        assert_eq!(syntax, vec![XML_COPYRIGHT_HEADER, COPYRIGHT_HEADER]);
        assert!(catalog.find("unnecessaryimports").is_some());
    }

    #[test]
    fn test_register_twice_fails() {
        let mut catalog = builtin_catalog();
        assert!(register_builtin_rules(&mut catalog).is_err());
    }
}
