//! 动作描述与参数校验
//!
//! ActionSpec 是注册表中不可变的静态描述：名称、说明、有序参数表。
//! validate 在调用处理器前对模型给出的原始参数做校验与类型宽松转换（如单个字符串包装为数组），
//! 处理器只会拿到 ValidatedArgs。

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::actions::ActionFailure;

/// 参数类型
#[derive(Debug, Clone, PartialEq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<ParamType>),
    /// 嵌套对象：字段声明仅用于向模型描述，逐项完整性由批量处理器自行报告
    Object(Vec<ParamSpec>),
}

impl ParamType {
    fn json_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    fn to_json_schema(&self, description: Option<&str>) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), Value::String(self.json_type().into()));
        if let Some(d) = description {
            schema.insert("description".into(), Value::String(d.into()));
        }
        match self {
            Self::Array(items) => {
                schema.insert("items".into(), items.to_json_schema(None));
            }
            Self::Object(fields) => {
                let (properties, required) = object_schema_parts(fields);
                schema.insert("properties".into(), Value::Object(properties));
                schema.insert("required".into(), json!(required));
            }
            _ => {}
        }
        Value::Object(schema)
    }
}

/// 单个参数声明
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    pub description: String,
}

impl ParamSpec {
    pub fn new(name: &str, ty: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            ty,
            required: false,
            description: description.to_string(),
        }
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::String, description)
    }

    pub fn array(name: &str, items: ParamType, description: &str) -> Self {
        Self::new(name, ParamType::Array(Box::new(items)), description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

fn object_schema_parts(fields: &[ParamSpec]) -> (Map<String, Value>, Vec<String>) {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for p in fields {
        properties.insert(p.name.clone(), p.ty.to_json_schema(Some(&p.description)));
        if p.required {
            required.push(p.name.clone());
        }
    }
    (properties, required)
}

/// 动作静态描述；注册后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

impl ActionSpec {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
        }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// 参数的 JSON Schema（供模型 function calling 使用）
    pub fn parameters_schema(&self) -> Value {
        let (properties, required) = object_schema_parts(&self.parameters);
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// 校验并转换模型给出的原始参数
    ///
    /// - null 视为空对象，其它非对象类型直接拒绝
    /// - 未声明的参数、缺失的必填参数均拒绝
    /// - 每个参数按声明类型做宽松转换，无法转换则拒绝
    pub fn validate(&self, raw: &Value) -> Result<ValidatedArgs, String> {
        let empty = Map::new();
        let supplied = match raw {
            Value::Null => &empty,
            Value::Object(m) => m,
            other => {
                return Err(format!(
                    "arguments for `{}` must be a JSON object, got {}",
                    self.name,
                    type_name(other)
                ))
            }
        };

        if let Some(unknown) = supplied.keys().find(|k| self.parameter(k).is_none()) {
            return Err(format!(
                "unknown parameter `{}` for `{}` (expected one of: {})",
                unknown,
                self.name,
                self.parameters
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        let mut out = Map::new();
        for p in &self.parameters {
            match supplied.get(&p.name) {
                None | Some(Value::Null) => {
                    if p.required {
                        return Err(format!("missing required parameter `{}`", p.name));
                    }
                }
                Some(v) => {
                    let coerced = coerce(v, &p.ty)
                        .map_err(|e| format!("parameter `{}`: {}", p.name, e))?;
                    out.insert(p.name.clone(), coerced);
                }
            }
        }
        Ok(ValidatedArgs(out))
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 按声明类型转换单个值
fn coerce(v: &Value, ty: &ParamType) -> Result<Value, String> {
    match (ty, v) {
        (ParamType::String, Value::String(_)) => Ok(v.clone()),
        (ParamType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (ParamType::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),

        (ParamType::Integer, Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                Ok(v.clone())
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                        Ok(json!(f as i64))
                    }
                    _ => Err(format!("expected integer, got {n}")),
                }
            }
        }
        (ParamType::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(|i| json!(i))
            .map_err(|_| format!("expected integer, got \"{s}\"")),

        (ParamType::Number, Value::Number(_)) => Ok(v.clone()),
        (ParamType::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
            .ok_or_else(|| format!("expected number, got \"{s}\"")),

        (ParamType::Boolean, Value::Bool(_)) => Ok(v.clone()),
        (ParamType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Ok(Value::Bool(true)),
            "false" | "no" => Ok(Value::Bool(false)),
            _ => Err(format!("expected boolean, got \"{s}\"")),
        },

        (ParamType::Array(items), Value::Array(arr)) => arr
            .iter()
            .enumerate()
            .map(|(i, item)| coerce(item, items).map_err(|e| format!("item {i}: {e}")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        // 模型有时把数组编码成字符串
        // 解析不出数组时按普通单值处理，如 "[Archive] 2024"
        (ParamType::Array(items), Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Array(_)) => coerce(&parsed, ty),
            _ => coerce(v, items).map(|x| Value::Array(vec![x])),
        },
        // 单个值包装为单元素数组
        (ParamType::Array(items), other) => coerce(other, items).map(|x| Value::Array(vec![x])),

        (ParamType::Object(fields), Value::Object(m)) => {
            let mut out = m.clone();
            for f in fields {
                if let Some(fv) = m.get(&f.name) {
                    // 嵌套字段尽力转换；失败时保留原值交由处理器逐项报告
                    if let Ok(c) = coerce(fv, &f.ty) {
                        out.insert(f.name.clone(), c);
                    }
                }
            }
            Ok(Value::Object(out))
        }

        (ty, other) => Err(format!("expected {}, got {}", ty.json_type(), type_name(other))),
    }
}

/// 已通过校验的参数；处理器只接收此类型
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedArgs(Map<String, Value>);

impl ValidatedArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.as_str())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// 反序列化为处理器自己的参数结构体
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ActionFailure> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| ActionFailure::invalid_arguments(format!("invalid arguments: {e}")))
    }
}
