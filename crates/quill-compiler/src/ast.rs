//! Abstract syntax tree produced by the parser.
//!
//! Every node carries a [`Span`] so diagnostics and the evaluator's
//! cancellation checks can point back at source text.

use quill_core::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Using(UsingDecl),
    Namespace(NamespaceDecl),
    Function(FunctionDecl),
    Struct(StructDecl),
    Class(ClassDecl),
    Interface(InterfaceDecl),
    Enum(EnumDecl),
    Statement(Stmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsingDecl {
    pub path: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceDecl {
    pub name: String,
    pub items: Vec<Item>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub name: String,
    pub array_rank: u32,
    pub nullable: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    ByValue,
    Ref,
    Out,
    Params,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub mode: ParamMode,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_ty: Option<TypeRef>,
    pub body: Option<Block>,
    pub is_static: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<Expr>,
    pub is_static: bool,
    pub is_readonly: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<FunctionDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub base: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<FunctionDecl>,
    pub constructors: Vec<FunctionDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub methods: Vec<FunctionDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub underlying: Option<TypeRef>,
    pub members: Vec<EnumMember>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub is_const: bool,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub exception_ty: Option<TypeRef>,
    pub binding: Option<String>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    VarDecl(VarDecl),
    Block(Block),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Vec<Expr>,
        body: Box<Stmt>,
        span: Span,
    },
    ForEach {
        binding: ForEachBinding,
        binding_ty: Option<TypeRef>,
        iterable: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    Switch {
        scrutinee: Expr,
        arms: Vec<SwitchArm>,
        span: Span,
    },
    Try {
        body: Block,
        catches: Vec<CatchClause>,
        finally: Option<Block>,
        span: Span,
    },
    Throw {
        value: Option<Expr>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    Goto {
        label: String,
        span: Span,
    },
    GotoCase {
        value: Expr,
        span: Span,
    },
    GotoDefault {
        span: Span,
    },
    Label {
        name: String,
        span: Span,
    },
    Using {
        decl: Box<Stmt>,
        body: Box<Stmt>,
        span: Span,
    },
    Function(FunctionDecl),
    Empty {
        span: Span,
    },
}

/// A `foreach` loop's per-iteration binding: either a single name or a
/// tuple-deconstruction pattern (`foreach (var (k, v) in pairs)`).
#[derive(Debug, Clone, PartialEq)]
pub enum ForEachBinding {
    Single(String),
    Tuple(Vec<String>),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(e) => e.span(),
            Stmt::VarDecl(v) => v.span,
            Stmt::Block(b) => b.span,
            Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::DoWhile { span, .. }
            | Stmt::For { span, .. }
            | Stmt::ForEach { span, .. }
            | Stmt::Switch { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Throw { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Goto { span, .. }
            | Stmt::GotoCase { span, .. }
            | Stmt::GotoDefault { span }
            | Stmt::Label { span, .. }
            | Stmt::Using { span, .. }
            | Stmt::Empty { span } => *span,
            Stmt::Function(f) => f.span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    Coalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
    AddressOf,
    Deref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    Coalesce,
}

/// A literal-text fragment or `{expr}` substitution inside an interpolated
/// string.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationPart {
    Literal(String),
    Expr {
        expr: Expr,
        alignment: Option<Expr>,
        format: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLiteral {
        value: i64,
        tag_hint: Option<String>,
        span: Span,
    },
    FloatLiteral {
        value: f64,
        tag_hint: Option<String>,
        span: Span,
    },
    BoolLiteral {
        value: bool,
        span: Span,
    },
    CharLiteral {
        value: char,
        span: Span,
    },
    StringLiteral {
        value: String,
        span: Span,
    },
    InterpolatedString {
        parts: Vec<InterpolationPart>,
        span: Span,
    },
    NullLiteral {
        span: Span,
    },
    Ident {
        name: String,
        span: Span,
    },
    This {
        span: Span,
    },
    Paren {
        inner: Box<Expr>,
        span: Span,
    },
    Tuple {
        elements: Vec<Expr>,
        span: Span,
    },
    ArrayLiteral {
        elements: Vec<Expr>,
        span: Span,
    },
    NewArray {
        element_ty: TypeRef,
        lengths: Vec<Expr>,
        span: Span,
    },
    NewObject {
        ty: TypeRef,
        args: Vec<Arg>,
        span: Span,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
        span: Span,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Arg>,
        span: Span,
    },
    Index {
        target: Box<Expr>,
        index: IndexKind,
        span: Span,
    },
    Member {
        target: Box<Expr>,
        name: String,
        span: Span,
    },
    Cast {
        ty: TypeRef,
        operand: Box<Expr>,
        span: Span,
    },
    Is {
        operand: Box<Expr>,
        pattern: Box<Pattern>,
        span: Span,
    },
    SwitchExpr {
        scrutinee: Box<Expr>,
        arms: Vec<(Pattern, Option<Expr>, Expr)>,
        span: Span,
    },
    Lambda {
        params: Vec<Param>,
        body: LambdaBody,
        span: Span,
    },
}

/// The bracketed part of an index expression: a plain index, a from-end
/// index (`^k`), or a half-open slice bound (either side may be omitted).
#[derive(Debug, Clone, PartialEq)]
pub enum IndexKind {
    Single(Box<Expr>),
    FromEnd(Box<Expr>),
    Range { start: Option<Box<Expr>>, end: Option<Box<Expr>> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
    pub mode: ParamMode,
    pub span: Span,
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::IntLiteral { span, .. }
            | Expr::FloatLiteral { span, .. }
            | Expr::BoolLiteral { span, .. }
            | Expr::CharLiteral { span, .. }
            | Expr::StringLiteral { span, .. }
            | Expr::InterpolatedString { span, .. }
            | Expr::NullLiteral { span }
            | Expr::Ident { span, .. }
            | Expr::This { span }
            | Expr::Paren { span, .. }
            | Expr::Tuple { span, .. }
            | Expr::ArrayLiteral { span, .. }
            | Expr::NewArray { span, .. }
            | Expr::NewObject { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Call { span, .. }
            | Expr::Index { span, .. }
            | Expr::Member { span, .. }
            | Expr::Cast { span, .. }
            | Expr::Is { span, .. }
            | Expr::SwitchExpr { span, .. }
            | Expr::Lambda { span, .. } => *span,
        }
    }
}

/// Pattern forms usable in `is`-expressions and `switch` arms.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Wildcard {
        span: Span,
    },
    Null {
        span: Span,
    },
    Type {
        ty: TypeRef,
        binding: Option<String>,
        span: Span,
    },
    Constant {
        value: Expr,
        span: Span,
    },
    Relational {
        op: BinOp,
        value: Expr,
        span: Span,
    },
    And {
        left: Box<Pattern>,
        right: Box<Pattern>,
        span: Span,
    },
    Or {
        left: Box<Pattern>,
        right: Box<Pattern>,
        span: Span,
    },
    Not {
        inner: Box<Pattern>,
        span: Span,
    },
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Wildcard { span }
            | Pattern::Null { span }
            | Pattern::Type { span, .. }
            | Pattern::Constant { span, .. }
            | Pattern::Relational { span, .. }
            | Pattern::And { span, .. }
            | Pattern::Or { span, .. }
            | Pattern::Not { span, .. } => *span,
        }
    }
}
