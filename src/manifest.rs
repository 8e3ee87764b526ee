//! The TOML model manifest.
//!
//! Stands in for the external reflection facility: it declares the types of
//! a compilation (fields, accessor methods, lambdas, flattened capabilities)
//! and the models to compile, each with its template options. Field type
//! strings are ordinary Rust type syntax, parsed with `syn` and mapped onto
//! descriptor shapes.
//!
//! ```toml
//! [[types]]
//! name = "Person"
//! fields = [{ name = "name", type = "String" }]
//!
//! [[types]]
//! name = "HelloWorld"
//! fields = [
//!     { name = "message", type = "String" },
//!     { name = "people", type = "Vec<Person>" },
//! ]
//!
//! [[models]]
//! type = "HelloWorld"
//! path = "hello.mustache"
//! ```
//!
//! Types must be declared before they are referenced.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::compiler::ModelUnit;
use crate::config::TemplateConfig;
use crate::descriptor::{DescriptorCatalog, LambdaArg, TypeDescriptor, TypeRef};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read manifest `{path}`: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("type `{name}` referenced by `{referrer}` is not declared (declare types before use)")]
    UnknownType { name: String, referrer: String },

    #[error("`{ty}` in `{referrer}` is not a supported type: {reason}")]
    BadType {
        ty: String,
        referrer: String,
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Manifest {
    types: Vec<TypeDecl>,
    models: Vec<ModelDecl>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self { types: Vec::new(), models: Vec::new() }
    }
}

#[derive(Debug, Deserialize)]
struct TypeDecl {
    /// Rust path of the type, also the catalog key.
    name: String,
    #[serde(default)]
    fields: Vec<MemberDecl>,
    #[serde(default)]
    methods: Vec<MemberDecl>,
    #[serde(default)]
    lambdas: Vec<LambdaDecl>,
    /// Names of previously declared types whose members are flattened in.
    #[serde(default)]
    capabilities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MemberDecl {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Debug, Deserialize)]
struct LambdaDecl {
    name: String,
    /// `none`, `element`, `raw-body`, or `raw-body-element`.
    #[serde(default)]
    arg: String,
    result: String,
}

#[derive(Debug, Deserialize)]
struct ModelDecl {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(flatten)]
    config: TemplateConfig,
}

impl Manifest {
    pub fn from_str(text: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&text)
    }

    /// Builds the immutable descriptor catalog and the model batch.
    pub fn into_compilation(self, declared_at: &str) -> Result<(DescriptorCatalog, Vec<ModelUnit>), ManifestError> {
        let mut catalog = DescriptorCatalog::new();
        for decl in &self.types {
            let mut builder = TypeDescriptor::record(&decl.name);
            for capability in &decl.capabilities {
                let ty = catalog.get(capability).ok_or_else(|| ManifestError::UnknownType {
                    name: capability.clone(),
                    referrer: decl.name.clone(),
                })?;
                builder = builder.capability(ty);
            }
            for field in &decl.fields {
                builder = builder.field(&field.name, resolve_type(&field.ty, &decl.name, &catalog)?);
            }
            for method in &decl.methods {
                builder = builder.method(&method.name, resolve_type(&method.ty, &decl.name, &catalog)?);
            }
            for lambda in &decl.lambdas {
                let arg = match lambda.arg.as_str() {
                    "" | "none" => LambdaArg::None,
                    "element" => LambdaArg::Element,
                    "raw-body" => LambdaArg::RawBody,
                    "raw-body-element" => LambdaArg::RawBodyAndElement,
                    other => {
                        return Err(ManifestError::BadType {
                            ty: other.to_string(),
                            referrer: decl.name.clone(),
                            reason: "lambda arg must be none, element, raw-body, or raw-body-element"
                                .to_string(),
                        });
                    }
                };
                let result = resolve_type(&lambda.result, &decl.name, &catalog)?;
                builder = builder.lambda(&lambda.name, arg, result);
            }
            catalog.insert(builder.build());
        }

        let units = self
            .models
            .into_iter()
            .enumerate()
            .map(|(index, decl)| ModelUnit {
                type_name: decl.type_name,
                config: decl.config,
                declared_at: format!("{declared_at}#models[{index}]"),
            })
            .collect();
        Ok((catalog, units))
    }
}

/// Maps a Rust type string onto a descriptor: scalars, `Option`, `Vec`,
/// slices/arrays, string-keyed maps, and previously declared named types.
fn resolve_type(ty: &str, referrer: &str, catalog: &DescriptorCatalog) -> Result<TypeRef, ManifestError> {
    let parsed: syn::Type = syn::parse_str(ty).map_err(|e| ManifestError::BadType {
        ty: ty.to_string(),
        referrer: referrer.to_string(),
        reason: e.to_string(),
    })?;
    resolve_syn_type(&parsed, ty, referrer, catalog)
}

fn resolve_syn_type(
    parsed: &syn::Type,
    spelled: &str,
    referrer: &str,
    catalog: &DescriptorCatalog,
) -> Result<TypeRef, ManifestError> {
    let bad = |reason: &str| ManifestError::BadType {
        ty: spelled.to_string(),
        referrer: referrer.to_string(),
        reason: reason.to_string(),
    };

    match parsed {
        syn::Type::Reference(reference) => {
            resolve_syn_type(&reference.elem, spelled, referrer, catalog)
        }
        syn::Type::Slice(slice) => {
            let element = resolve_syn_type(&slice.elem, spelled, referrer, catalog)?;
            Ok(TypeDescriptor::array(element))
        }
        syn::Type::Array(array) => {
            let element = resolve_syn_type(&array.elem, spelled, referrer, catalog)?;
            Ok(TypeDescriptor::array(element))
        }
        syn::Type::Path(path) => {
            let segment = path.path.segments.last().ok_or_else(|| bad("empty path"))?;
            let ident = segment.ident.to_string();
            let generic_args = || -> Result<Vec<&syn::Type>, ManifestError> {
                match &segment.arguments {
                    syn::PathArguments::AngleBracketed(args) => Ok(args
                        .args
                        .iter()
                        .filter_map(|a| match a {
                            syn::GenericArgument::Type(t) => Some(t),
                            _ => None,
                        })
                        .collect()),
                    _ => Err(bad("missing generic arguments")),
                }
            };
            match ident.as_str() {
                "String" | "str" => Ok(TypeDescriptor::text()),
                "bool" => Ok(TypeDescriptor::boolean()),
                "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
                | "u128" | "usize" | "f32" | "f64" => Ok(TypeDescriptor::numeric(&ident)),
                "Option" => {
                    let args = generic_args()?;
                    let inner = args.first().ok_or_else(|| bad("Option needs a type argument"))?;
                    Ok(TypeDescriptor::nullable(resolve_syn_type(inner, spelled, referrer, catalog)?))
                }
                "Vec" => {
                    let args = generic_args()?;
                    let element = args.first().ok_or_else(|| bad("Vec needs a type argument"))?;
                    Ok(TypeDescriptor::iterable(resolve_syn_type(element, spelled, referrer, catalog)?))
                }
                "BTreeMap" | "HashMap" => {
                    let args = generic_args()?;
                    let value = args.get(1).ok_or_else(|| bad("maps need key and value types"))?;
                    Ok(TypeDescriptor::map(resolve_syn_type(value, spelled, referrer, catalog)?))
                }
                _ => {
                    let key = path_string(&path.path);
                    catalog.get(&key).cloned().ok_or_else(|| ManifestError::UnknownType {
                        name: key,
                        referrer: referrer.to_string(),
                    })
                }
            }
        }
        _ => Err(bad("unsupported type syntax")),
    }
}

fn path_string(path: &syn::Path) -> String {
    let mut out = String::new();
    if path.leading_colon.is_some() {
        out.push_str("::");
    }
    for (i, segment) in path.segments.iter().enumerate() {
        if i > 0 {
            out.push_str("::");
        }
        out.push_str(&segment.ident.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::TypeShape;

    const MANIFEST: &str = r#"
        [[types]]
        name = "Person"
        fields = [{ name = "name", type = "String" }]

        [[types]]
        name = "HelloWorld"
        fields = [
            { name = "message", type = "String" },
            { name = "people", type = "Vec<Person>" },
            { name = "admin", type = "bool" },
            { name = "nick", type = "Option<String>" },
            { name = "props", type = "BTreeMap<String, String>" },
        ]
        lambdas = [{ name = "age_info", arg = "element", result = "Person" }]

        [[models]]
        type = "HelloWorld"
        template = "{{message}}"
        content_type = "html"
    "#;

    #[test]
    fn manifest_builds_catalog_and_units() {
        let manifest = Manifest::from_str(MANIFEST).expect("parse");
        let (catalog, units) = manifest.into_compilation("m.toml").expect("compile");

        let hello = catalog.get("HelloWorld").expect("type");
        assert!(matches!(
            hello.member("people").expect("people").ty.shape(),
            TypeShape::Iterable(_)
        ));
        assert!(matches!(
            hello.member("age_info").expect("lambda").ty.shape(),
            TypeShape::Lambda(_)
        ));

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].type_name, "HelloWorld");
        assert_eq!(units[0].config.template, "{{message}}");
        assert!(units[0].declared_at.starts_with("m.toml#models[0]"));
    }

    #[test]
    fn forward_references_are_rejected() {
        let manifest = Manifest::from_str(
            r#"
            [[types]]
            name = "A"
            fields = [{ name = "b", type = "B" }]

            [[types]]
            name = "B"
            "#,
        )
        .expect("parse");
        let err = manifest.into_compilation("m.toml").expect_err("must fail");
        assert!(matches!(err, ManifestError::UnknownType { .. }));
    }

    #[test]
    fn capabilities_flatten_members() {
        let manifest = Manifest::from_str(
            r#"
            [[types]]
            name = "Timestamps"
            methods = [{ name = "created_at", type = "String" }]

            [[types]]
            name = "Post"
            capabilities = ["Timestamps"]
            fields = [{ name = "title", type = "String" }]
            "#,
        )
        .expect("parse");
        let (catalog, _) = manifest.into_compilation("m.toml").expect("compile");
        let post = catalog.get("Post").expect("type");
        assert!(post.member("created_at").is_some());
        assert!(post.member("title").is_some());
    }

    #[test]
    fn slices_and_references_normalize() {
        let manifest = Manifest::from_str(
            r#"
            [[types]]
            name = "M"
            fields = [
                { name = "tags", type = "&[String]" },
                { name = "label", type = "&str" },
            ]
            "#,
        )
        .expect("parse");
        let (catalog, _) = manifest.into_compilation("m.toml").expect("compile");
        let m = catalog.get("M").expect("type");
        assert!(matches!(m.member("tags").unwrap().ty.shape(), TypeShape::Array(_)));
        assert!(matches!(m.member("label").unwrap().ty.shape(), TypeShape::Text));
    }
}
