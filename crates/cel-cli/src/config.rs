//! JSON environment files for `cel check --env`.
//!
//! ```json
//! {
//!   "container": "acme",
//!   "abbrevs": ["acme.billing.Invoice"],
//!   "aliases": [{ "alias": "shop", "name": "acme.shop" }],
//!   "idents": [{ "name": "limit", "type": "int", "value": 10 }],
//!   "functions": [{
//!     "name": "first",
//!     "overloads": [{ "id": "first_list", "params": ["list(T)"], "result": "T",
//!                     "type_params": ["T"], "receiver": true }]
//!   }],
//!   "messages": [{ "name": "acme.Order", "fields": { "id": "int" } }]
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cel_ast::Constant;
use cel_typeck::{
    parse_type, Container, ContainerError, Env, EnvError, FunctionDecl, IdentDecl,
    MessageRegistry, Overload, Type, TypeSyntaxError,
};
use serde::Deserialize;
use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid environment file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{context}: {source}")]
    Type {
        context: String,
        source: TypeSyntaxError,
    },
    #[error("unsupported value for identifier '{0}'")]
    Value(String),
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error(transparent)]
    Container(#[from] ContainerError),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvConfig {
    pub container: Option<String>,
    pub abbrevs: Vec<String>,
    pub aliases: Vec<AliasConfig>,
    pub idents: Vec<IdentConfig>,
    pub functions: Vec<FunctionConfig>,
    pub messages: Vec<MessageConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasConfig {
    pub alias: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionConfig {
    pub name: String,
    pub overloads: Vec<OverloadConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverloadConfig {
    pub id: String,
    #[serde(default)]
    pub params: Vec<String>,
    pub result: String,
    #[serde(default)]
    pub type_params: Vec<String>,
    /// The first param is the receiver.
    #[serde(default)]
    pub receiver: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageConfig {
    pub name: String,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl EnvConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build a standard environment extended with these declarations.
    /// `container` overrides the one named in the file.
    pub fn build(&self, container: Option<&str>) -> Result<Env, ConfigError> {
        let name = container.or(self.container.as_deref()).unwrap_or_default();
        let mut container = Container::new(name);
        container.add_abbrevs(&self.abbrevs)?;
        for alias in &self.aliases {
            container.add_alias(&alias.name, &alias.alias)?;
        }

        let mut registry = MessageRegistry::new();
        for message in &self.messages {
            let mut fields = Vec::with_capacity(message.fields.len());
            for (field, ty) in &message.fields {
                let text = ty.as_str().ok_or_else(|| ConfigError::Value(field.clone()))?;
                let context = format!("field {}.{field}", message.name);
                fields.push((field.as_str(), type_of(text, &[], context)?));
            }
            registry.add_message(message.name.as_str(), fields);
        }

        let mut env = Env::standard(container, Arc::new(registry))?;
        for ident in &self.idents {
            let ty = type_of(&ident.ty, &[], format!("identifier {}", ident.name))?;
            let mut decl = IdentDecl::new(ident.name.as_str(), ty);
            if let Some(value) = &ident.value {
                decl = decl.with_value(constant(&ident.name, value)?);
            }
            env.add_ident(decl)?;
        }
        for function in &self.functions {
            let mut decl = FunctionDecl::new(function.name.as_str());
            for overload in &function.overloads {
                decl.add_overload(overload.to_overload()?)?;
            }
            env.add_function(decl)?;
        }
        tracing::debug!(
            idents = self.idents.len(),
            functions = self.functions.len(),
            messages = self.messages.len(),
            "loaded environment"
        );
        Ok(env)
    }
}

impl OverloadConfig {
    fn to_overload(&self) -> Result<Overload, ConfigError> {
        let type_params: Vec<SmolStr> = self
            .type_params
            .iter()
            .map(|p| p.as_str().into())
            .collect();
        let context = format!("overload {}", self.id);
        let params = self
            .params
            .iter()
            .map(|p| type_of(p, &type_params, context.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        let result = type_of(&self.result, &type_params, context)?;
        let overload = if self.receiver {
            Overload::instance(self.id.as_str(), params, result)
        } else {
            Overload::global(self.id.as_str(), params, result)
        };
        Ok(overload.with_type_params(type_params))
    }
}

fn type_of(text: &str, type_params: &[SmolStr], context: String) -> Result<Type, ConfigError> {
    parse_type(text, type_params).map_err(|source| ConfigError::Type { context, source })
}

fn constant(name: &str, value: &serde_json::Value) -> Result<Constant, ConfigError> {
    use serde_json::Value;
    let constant = match value {
        Value::Null => Constant::Null,
        Value::Bool(b) => Constant::Bool(*b),
        Value::String(s) => Constant::String(s.as_str().into()),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => Constant::Int(i),
            (None, Some(u), _) => Constant::Uint(u),
            (None, None, Some(d)) => Constant::Double(d),
            _ => return Err(ConfigError::Value(name.to_string())),
        },
        Value::Array(_) | Value::Object(_) => return Err(ConfigError::Value(name.to_string())),
    };
    Ok(constant)
}
