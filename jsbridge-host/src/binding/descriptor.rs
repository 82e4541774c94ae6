use jsbridge_core::{deserialize_parameters, BridgeError, ListRef, Node, ParametersTypes, TypeHint};

/// One parameter as seen by the binder.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    pub position: usize,
    pub hint: TypeHint,
}

/// Signature of a bound method: fixed positional parameters plus at most
/// one trailing variadic parameter. Built once at registration.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    name: String,
    mandatory: Vec<ParameterInfo>,
    variadic: Option<ParameterInfo>,
}

/// Arguments as they arrive from the renderer.
#[derive(Debug, Clone)]
pub enum MethodArguments {
    /// Already decoded, untyped values.
    Nodes(Vec<Node>),
    /// Wire JSON array, decoded against the method signature.
    Json(String),
}

impl MethodDescriptor {
    /// `parameters` lists each parameter's hint and whether it is variadic.
    pub fn new(name: impl Into<String>, parameters: Vec<(TypeHint, bool)>) -> Result<Self, BridgeError> {
        let name = name.into();
        let count = parameters.len();
        let mut mandatory = Vec::with_capacity(count);
        let mut variadic = None;

        for (position, (hint, is_variadic)) in parameters.into_iter().enumerate() {
            let info = ParameterInfo { position, hint };
            if is_variadic {
                if position + 1 != count {
                    return Err(BridgeError::invalid_argument(format!(
                        "Method {} has a variadic parameter that is not the last one",
                        name
                    )));
                }
                variadic = Some(info);
            } else {
                mandatory.push(info);
            }
        }

        Ok(MethodDescriptor {
            name,
            mandatory,
            variadic,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mandatory_parameters(&self) -> &[ParameterInfo] {
        &self.mandatory
    }

    pub fn variadic_parameter(&self) -> Option<&ParameterInfo> {
        self.variadic.as_ref()
    }

    pub fn parameters_types(&self) -> ParametersTypes {
        ParametersTypes {
            mandatory: self.mandatory.iter().map(|p| p.hint.clone()).collect(),
            optional: self.variadic.as_ref().map(|p| p.hint.clone()),
        }
    }

    fn argument_count_error(&self) -> BridgeError {
        BridgeError::invalid_argument(format!(
            "Number of arguments provided does not match the number of {} method required parameters.",
            self.name
        ))
    }

    /// Produces exactly one node per declared parameter. The variadic slot
    /// receives a list of the remaining arguments, empty when there are none.
    /// Surplus arguments of a method without a variadic parameter are dropped.
    pub fn bind(&self, arguments: MethodArguments) -> Result<Vec<Node>, BridgeError> {
        match arguments {
            MethodArguments::Nodes(mut nodes) => {
                if nodes.len() < self.mandatory.len() {
                    return Err(self.argument_count_error());
                }
                let rest = nodes.split_off(self.mandatory.len());
                if self.variadic.is_some() {
                    nodes.push(Node::List(ListRef::from_vec(rest)));
                }
                Ok(nodes)
            }
            MethodArguments::Json(wire) => {
                let nodes = deserialize_parameters(&wire, &self.parameters_types())?;
                let expected = self.mandatory.len() + usize::from(self.variadic.is_some());
                if nodes.len() < expected {
                    return Err(self.argument_count_error());
                }
                Ok(nodes)
            }
        }
    }
}

/// Lower camel case as seen from script: `get_value` and `GetValue` both
/// become `getValue`.
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for (i, ch) in name.chars().enumerate() {
        if ch == '_' {
            upper_next = !out.is_empty();
            continue;
        }
        if i == 0 || out.is_empty() {
            out.extend(ch.to_lowercase());
        } else if upper_next {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        upper_next = false;
    }
    out
}
