use std::fmt;
use std::sync::{Arc, OnceLock};

/// A static type of the object model.
///
/// Equality is structural for constructed types and by full name for
/// declared classes and enums.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// Top type; every type converts to it
    Object,
    Boolean,
    Char,
    String,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    Decimal,
    DateTime,
    TimeSpan,
    Guid,
    /// The type of type-literal constants such as `Int32` in `is(Int32)`
    SystemType,

    /// Value type `T` widened with null
    Nullable(Box<Type>),
    /// Single-dimension array
    Array(Box<Type>),
    /// Indexable list with a `Count`
    List(Box<Type>),
    /// Plain enumerable sequence
    Sequence(Box<Type>),
    /// Group produced by `GroupBy`: key type and element type
    Grouping(Box<Type>, Box<Type>),
    /// Function type of a lambda: parameter types and result
    Lambda(Vec<Type>, Box<Type>),

    Enum(Arc<EnumType>),
    Class(Arc<ClassType>),
    /// Record type generated for a `new(...)` projection
    Anonymous(Arc<AnonymousType>),
    /// Name/value bag: member access resolves through its string indexer
    DynamicClass,
}

impl Type {
    pub fn nullable(inner: Type) -> Type {
        match inner {
            Type::Nullable(_) => inner,
            other if other.is_value_type() => Type::Nullable(Box::new(other)),
            other => other,
        }
    }

    pub fn sequence(element: Type) -> Type {
        Type::Sequence(Box::new(element))
    }

    pub fn list(element: Type) -> Type {
        Type::List(Box::new(element))
    }

    pub fn array(element: Type) -> Type {
        Type::Array(Box::new(element))
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }

    /// `T` for `Nullable(T)`, the type itself otherwise.
    pub fn non_nullable(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            other => other,
        }
    }

    pub fn is_value_type(&self) -> bool {
        match self {
            Type::Boolean
            | Type::Char
            | Type::SByte
            | Type::Byte
            | Type::Int16
            | Type::UInt16
            | Type::Int32
            | Type::UInt32
            | Type::Int64
            | Type::UInt64
            | Type::Single
            | Type::Double
            | Type::Decimal
            | Type::DateTime
            | Type::TimeSpan
            | Type::Guid
            | Type::Nullable(_)
            | Type::Enum(_) => true,
            Type::Class(class) => class.is_value_type(),
            _ => false,
        }
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.non_nullable(), Type::Enum(_))
    }

    pub fn as_enum(&self) -> Option<&Arc<EnumType>> {
        match self.non_nullable() {
            Type::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Arc<ClassType>> {
        match self {
            Type::Class(c) => Some(c),
            _ => None,
        }
    }

    /// Numeric types, nullable or not. Enums are not numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.non_nullable(),
            Type::SByte
                | Type::Byte
                | Type::Int16
                | Type::UInt16
                | Type::Int32
                | Type::UInt32
                | Type::Int64
                | Type::UInt64
                | Type::Single
                | Type::Double
                | Type::Decimal
        )
    }

    pub fn is_integral(&self) -> bool {
        self.is_signed_integral() || self.is_unsigned_integral()
    }

    pub fn is_signed_integral(&self) -> bool {
        matches!(
            self.non_nullable(),
            Type::SByte | Type::Int16 | Type::Int32 | Type::Int64
        )
    }

    pub fn is_unsigned_integral(&self) -> bool {
        matches!(
            self.non_nullable(),
            Type::Byte | Type::UInt16 | Type::UInt32 | Type::UInt64
        )
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Type::String)
    }

    /// The element type of the enumerable capability, if the type has one.
    pub fn element_type(&self) -> Option<Type> {
        match self {
            Type::Array(e) | Type::List(e) | Type::Sequence(e) => Some((**e).clone()),
            Type::Grouping(_, e) => Some((**e).clone()),
            Type::String => Some(Type::Char),
            Type::Class(class) => class.body().element_type.clone(),
            _ => None,
        }
    }

    /// Simple name without namespace or generic arguments.
    pub fn simple_name(&self) -> String {
        match self {
            Type::Enum(e) => e.name.clone(),
            Type::Class(c) => c.name().to_string(),
            Type::Nullable(_) => "Nullable".to_string(),
            Type::Array(_) => "Array".to_string(),
            Type::List(_) => "List".to_string(),
            Type::Sequence(_) => "IEnumerable".to_string(),
            Type::Grouping(..) => "IGrouping".to_string(),
            Type::Lambda(..) => "Func".to_string(),
            other => other.to_string(),
        }
    }

    /// Namespace-qualified name, used for full-name type lookup.
    pub fn full_name(&self) -> String {
        match self {
            Type::Enum(e) => qualify(e.namespace.as_deref(), &e.name),
            Type::Class(c) => c.full_name(),
            Type::Object
            | Type::Boolean
            | Type::Char
            | Type::String
            | Type::SByte
            | Type::Byte
            | Type::Int16
            | Type::UInt16
            | Type::Int32
            | Type::UInt32
            | Type::Int64
            | Type::UInt64
            | Type::Single
            | Type::Double
            | Type::Decimal
            | Type::DateTime
            | Type::TimeSpan
            | Type::Guid => format!("System.{}", self),
            other => other.to_string(),
        }
    }
}

fn qualify(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{}.{}", ns, name),
        _ => name.to_string(),
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Object => write!(f, "Object"),
            Type::Boolean => write!(f, "Boolean"),
            Type::Char => write!(f, "Char"),
            Type::String => write!(f, "String"),
            Type::SByte => write!(f, "SByte"),
            Type::Byte => write!(f, "Byte"),
            Type::Int16 => write!(f, "Int16"),
            Type::UInt16 => write!(f, "UInt16"),
            Type::Int32 => write!(f, "Int32"),
            Type::UInt32 => write!(f, "UInt32"),
            Type::Int64 => write!(f, "Int64"),
            Type::UInt64 => write!(f, "UInt64"),
            Type::Single => write!(f, "Single"),
            Type::Double => write!(f, "Double"),
            Type::Decimal => write!(f, "Decimal"),
            Type::DateTime => write!(f, "DateTime"),
            Type::TimeSpan => write!(f, "TimeSpan"),
            Type::Guid => write!(f, "Guid"),
            Type::SystemType => write!(f, "Type"),
            Type::Nullable(inner) => write!(f, "{}?", inner),
            Type::Array(e) => write!(f, "{}[]", e),
            Type::List(e) => write!(f, "List<{}>", e),
            Type::Sequence(e) => write!(f, "IEnumerable<{}>", e),
            Type::Grouping(k, e) => write!(f, "IGrouping<{}, {}>", k, e),
            Type::Lambda(params, result) => {
                write!(f, "Func<")?;
                for p in params {
                    write!(f, "{}, ", p)?;
                }
                write!(f, "{}>", result)
            }
            Type::Enum(e) => write!(f, "{}", e.name),
            Type::Class(c) => write!(f, "{}", c.name()),
            Type::Anonymous(a) => write!(f, "DynamicClass{}", a.id),
            Type::DynamicClass => write!(f, "DynamicClass"),
        }
    }
}

/// Enumeration over an integral underlying type.
#[derive(Debug)]
pub struct EnumType {
    pub name: String,
    pub namespace: Option<String>,
    pub underlying: Type,
    pub variants: Vec<(String, i64)>,
}

impl EnumType {
    /// An `Int32`-backed enum.
    pub fn new(name: impl Into<String>, variants: &[(&str, i64)]) -> Type {
        EnumType::with_underlying(name, None, Type::Int32, variants)
    }

    pub fn with_underlying(
        name: impl Into<String>,
        namespace: Option<String>,
        underlying: Type,
        variants: &[(&str, i64)],
    ) -> Type {
        Type::Enum(Arc::new(EnumType {
            name: name.into(),
            namespace,
            underlying,
            variants: variants
                .iter()
                .map(|(n, v)| (n.to_string(), *v))
                .collect(),
        }))
    }

    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.variants
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.namespace == other.namespace
    }
}

/// Whether a member is a property or a field. Both are accessed alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Property,
    Field,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub ty: Type,
    pub kind: MemberKind,
    pub is_static: bool,
}

/// A callable member: instance or static method, or an operator method
/// (`op_Equality`, `op_Implicit`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    /// Name of the declaring type, for diagnostics and evaluation
    pub declaring_type: String,
    pub params: Vec<Type>,
    /// `None` for methods without a result
    pub return_type: Option<Type>,
    pub is_static: bool,
}

impl Method {
    pub fn new(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        params: Vec<Type>,
        return_type: Type,
    ) -> Self {
        Method {
            name: name.into(),
            declaring_type: declaring_type.into(),
            params,
            return_type: Some(return_type),
            is_static: false,
        }
    }

    pub fn new_static(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        params: Vec<Type>,
        return_type: Type,
    ) -> Self {
        Method {
            is_static: true,
            ..Method::new(declaring_type, name, params, return_type)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constructor {
    pub params: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Indexer {
    pub params: Vec<Type>,
    pub ty: Type,
}

/// Everything declared by a class besides its name.
#[derive(Debug, Clone, Default)]
pub struct ClassBody {
    pub base: Option<Type>,
    pub members: Vec<Member>,
    pub methods: Vec<Arc<Method>>,
    pub constructors: Vec<Constructor>,
    pub indexers: Vec<Indexer>,
    /// Operator and conversion methods
    pub operators: Vec<Arc<Method>>,
    /// Element type when the class is itself enumerable
    pub element_type: Option<Type>,
}

/// A declared reference or value ("struct") type.
///
/// The body is attached once, after the class has a name, so members can
/// refer back to the class itself.
pub struct ClassType {
    name: String,
    namespace: Option<String>,
    value_type: bool,
    body: OnceLock<ClassBody>,
}

impl ClassType {
    /// Declares a class whose body is supplied later with [`ClassType::define`].
    pub fn declare(
        name: impl Into<String>,
        namespace: Option<String>,
        value_type: bool,
    ) -> Arc<ClassType> {
        Arc::new(ClassType {
            name: name.into(),
            namespace,
            value_type,
            body: OnceLock::new(),
        })
    }

    /// Attaches the body. Returns `false` if one was already attached.
    pub fn define(&self, body: ClassBody) -> bool {
        self.body.set(body).is_ok()
    }

    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            class: ClassType::declare(name, None, false),
            body: ClassBody::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn full_name(&self) -> String {
        qualify(self.namespace.as_deref(), &self.name)
    }

    pub fn is_value_type(&self) -> bool {
        self.value_type
    }

    /// The class body, empty while undefined.
    pub fn body(&self) -> &ClassBody {
        static EMPTY: OnceLock<ClassBody> = OnceLock::new();
        self.body
            .get()
            .unwrap_or_else(|| EMPTY.get_or_init(ClassBody::default))
    }

    /// Base types, nearest first.
    pub fn ancestors(&self) -> Vec<Type> {
        let mut chain = vec![];
        let mut current = self.body().base.clone();
        while let Some(base) = current {
            current = base.as_class().and_then(|c| c.body().base.clone());
            chain.push(base);
        }
        chain
    }
}

impl PartialEq for ClassType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.namespace == other.namespace
            && self.value_type == other.value_type
    }
}

impl fmt::Debug for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassType({})", self.full_name())
    }
}

/// Fluent construction of a class with its body.
///
/// # Examples
///
/// ```
/// use dynlinq::types::{ClassType, Type};
///
/// let person = ClassType::builder("Person")
///     .property("Name", Type::String)
///     .property("Age", Type::Int32)
///     .build();
/// assert_eq!(person.to_string(), "Person");
/// ```
pub struct ClassBuilder {
    class: Arc<ClassType>,
    body: ClassBody,
}

impl ClassBuilder {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        let (name, value_type) = (self.class.name.clone(), self.class.value_type);
        self.class = ClassType::declare(name, Some(namespace.into()), value_type);
        self
    }

    pub fn value_type(mut self) -> Self {
        let (name, namespace) = (self.class.name.clone(), self.class.namespace.clone());
        self.class = ClassType::declare(name, namespace, true);
        self
    }

    pub fn base(mut self, base: Type) -> Self {
        self.body.base = Some(base);
        self
    }

    pub fn property(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.body.members.push(Member {
            name: name.into(),
            ty,
            kind: MemberKind::Property,
            is_static: false,
        });
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.body.members.push(Member {
            name: name.into(),
            ty,
            kind: MemberKind::Field,
            is_static: false,
        });
        self
    }

    pub fn static_property(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.body.members.push(Member {
            name: name.into(),
            ty,
            kind: MemberKind::Property,
            is_static: true,
        });
        self
    }

    pub fn method(mut self, name: impl Into<String>, params: Vec<Type>, ret: Type) -> Self {
        let declaring = self.class.name.clone();
        self.body
            .methods
            .push(Arc::new(Method::new(declaring, name, params, ret)));
        self
    }

    pub fn static_method(mut self, name: impl Into<String>, params: Vec<Type>, ret: Type) -> Self {
        let declaring = self.class.name.clone();
        self.body
            .methods
            .push(Arc::new(Method::new_static(declaring, name, params, ret)));
        self
    }

    pub fn void_method(mut self, name: impl Into<String>, params: Vec<Type>) -> Self {
        let declaring = self.class.name.clone();
        self.body.methods.push(Arc::new(Method {
            name: name.into(),
            declaring_type: declaring,
            params,
            return_type: None,
            is_static: false,
        }));
        self
    }

    pub fn constructor(mut self, params: Vec<Type>) -> Self {
        self.body.constructors.push(Constructor { params });
        self
    }

    pub fn indexer(mut self, params: Vec<Type>, ty: Type) -> Self {
        self.body.indexers.push(Indexer { params, ty });
        self
    }

    /// Declares an operator method such as `op_Equality` or `op_Implicit`.
    pub fn operator(mut self, name: impl Into<String>, params: Vec<Type>, ret: Type) -> Self {
        let declaring = self.class.name.clone();
        self.body
            .operators
            .push(Arc::new(Method::new_static(declaring, name, params, ret)));
        self
    }

    pub fn enumerable_of(mut self, element: Type) -> Self {
        self.body.element_type = Some(element);
        self
    }

    pub fn build(self) -> Type {
        self.class.define(self.body);
        Type::Class(self.class)
    }
}

/// Record type generated for an anonymous projection.
#[derive(Debug, Clone)]
pub struct AnonymousType {
    pub id: usize,
    pub members: Vec<(String, Type)>,
}

impl PartialEq for AnonymousType {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}
