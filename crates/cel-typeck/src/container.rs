use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::error::ContainerError;

/// Namespace used to qualify names during lookup, plus any aliases.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Container {
    name: SmolStr,
    aliases: IndexMap<SmolStr, SmolStr>,
}

impl Container {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            aliases: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &IndexMap<SmolStr, SmolStr> {
        &self.aliases
    }

    /// Candidate fully qualified names for `name`, most qualified first.
    ///
    /// With container `a.b` the name `R.s` yields `a.b.R.s`, `a.R.s` and
    /// `R.s`. A leading dot makes the name absolute. An alias for the first
    /// segment replaces the search entirely.
    pub fn resolve_candidate_names(&self, name: &str) -> Vec<String> {
        if let Some(absolute) = name.strip_prefix('.') {
            return vec![self.find_alias(absolute).unwrap_or_else(|| absolute.to_string())];
        }
        if let Some(alias) = self.find_alias(name) {
            return vec![alias];
        }
        if self.name.is_empty() {
            return vec![name.to_string()];
        }
        let mut candidates = vec![format!("{}.{}", self.name, name)];
        let mut prefix = self.name.as_str();
        while let Some(dot) = prefix.rfind('.') {
            prefix = &prefix[..dot];
            candidates.push(format!("{prefix}.{name}"));
        }
        candidates.push(name.to_string());
        candidates
    }

    /// Expand an alias on the first segment of `name`.
    pub fn find_alias(&self, name: &str) -> Option<String> {
        let (simple, qualifier) = match name.find('.') {
            Some(dot) => name.split_at(dot),
            None => (name, ""),
        };
        let alias = self.aliases.get(simple)?;
        Some(format!("{alias}{qualifier}"))
    }

    /// Alias each qualified name by its last segment.
    pub fn add_abbrevs<I, S>(&mut self, qualified_names: I) -> Result<(), ContainerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for qualified in qualified_names {
            let qn = qualified.as_ref().trim();
            let valid_chars = qn
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
            let alias = match qn.rfind('.') {
                Some(dot) if valid_chars && dot > 0 && dot < qn.len() - 1 => &qn[dot + 1..],
                _ => return Err(ContainerError::InvalidQualifiedName(qn.to_string())),
            };
            self.alias_as("abbreviation", qn, alias)?;
        }
        Ok(())
    }

    pub fn add_alias(&mut self, qualified_name: &str, alias: &str) -> Result<(), ContainerError> {
        self.alias_as("alias", qualified_name, alias)
    }

    fn alias_as(
        &mut self,
        kind: &'static str,
        qualified_name: &str,
        alias: &str,
    ) -> Result<(), ContainerError> {
        if alias.is_empty() || alias.contains('.') {
            return Err(ContainerError::NotSimple {
                kind,
                alias: alias.to_string(),
            });
        }
        if qualified_name.starts_with('.') {
            return Err(ContainerError::LeadingDot(qualified_name.to_string()));
        }
        match qualified_name.rfind('.') {
            Some(dot) if dot > 0 && dot < qualified_name.len() - 1 => {}
            _ => return Err(ContainerError::NotQualified(qualified_name.to_string())),
        }
        if let Some(existing) = self.find_alias(alias) {
            return Err(ContainerError::CollidesWithReference {
                kind,
                name: qualified_name.to_string(),
                alias: alias.to_string(),
                existing,
            });
        }
        if self.name == alias || self.name.starts_with(&format!("{alias}.")) {
            return Err(ContainerError::CollidesWithContainer {
                kind,
                name: qualified_name.to_string(),
                alias: alias.to_string(),
                container: self.name.to_string(),
            });
        }
        self.aliases.insert(alias.into(), qualified_name.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_most_qualified_first() {
        let c = Container::new("a.b.c");
        assert_eq!(
            c.resolve_candidate_names("R.s"),
            ["a.b.c.R.s", "a.b.R.s", "a.R.s", "R.s"]
        );
    }

    #[test]
    fn test_empty_container() {
        assert_eq!(Container::default().resolve_candidate_names("x"), ["x"]);
    }

    #[test]
    fn test_absolute_name() {
        let c = Container::new("a.b");
        assert_eq!(c.resolve_candidate_names(".x.y"), ["x.y"]);
    }

    #[test]
    fn test_alias_expands_first_segment() {
        let mut c = Container::new("a");
        c.add_alias("my.alias.R", "R").unwrap();
        assert_eq!(c.resolve_candidate_names("R.S.T"), ["my.alias.R.S.T"]);
        assert_eq!(c.resolve_candidate_names(".R"), ["my.alias.R"]);
        assert_eq!(c.resolve_candidate_names("Q"), ["a.Q", "Q"]);
    }

    #[test]
    fn test_abbrevs() {
        let mut c = Container::default();
        c.add_abbrevs(["qual.pkg.version.ObjTypeName", "alt.container.ver.FieldTypeName"])
            .unwrap();
        assert_eq!(
            c.resolve_candidate_names("ObjTypeName"),
            ["qual.pkg.version.ObjTypeName"]
        );
    }

    #[test]
    fn test_invalid_abbrevs() {
        let mut c = Container::default();
        let err = c.add_abbrevs(["bad-name.x"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid qualified name: bad-name.x, wanted name of the form 'qualified.name'"
        );
        assert!(c.add_abbrevs(["simple"]).is_err());
        assert!(c.add_abbrevs(["trailing."]).is_err());
    }

    #[test]
    fn test_alias_validation() {
        let mut c = Container::new("pkg.sub");
        assert_eq!(
            c.add_alias("a.b", "x.y").unwrap_err().to_string(),
            "alias must be non-empty and simple (not qualified): alias=x.y"
        );
        assert_eq!(
            c.add_alias(".a.b", "b").unwrap_err().to_string(),
            "qualified name must not begin with a leading '.': .a.b"
        );
        assert_eq!(
            c.add_alias("ab", "b").unwrap_err().to_string(),
            "qualified name must be of the form 'qualified.name': ab"
        );
        assert_eq!(
            c.add_alias("a.pkg", "pkg").unwrap_err().to_string(),
            "alias collides with container name: name=a.pkg, alias=pkg, container=pkg.sub"
        );
        c.add_alias("a.b", "b").unwrap();
        assert_eq!(
            c.add_abbrevs(["c.b"]).unwrap_err().to_string(),
            "abbreviation collides with existing reference: name=c.b, abbreviation=b, existing=a.b"
        );
    }
}
