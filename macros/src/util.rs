use quote::quote_spanned;
use syn::ext::IdentExt;
use syn::visit::{self, Visit};
use syn::visit_mut::{self, VisitMut};
use syn::{
    Arm, BinOp, Block, Expr, ExprAssign, ExprAsync, ExprClosure, ExprForLoop, ExprIf, ExprReference, ExprWhile, Ident,
    Item, Local, Pat, Stmt,
};

/// Rewrites a test body so every local it binds is recorded in the running
/// test's frame.
///
/// Covered: `let` (including `let .. else`), `for`, `if let`, `while let`
/// and `match` arm patterns, and plain or compound assignment to a local or
/// one of its fields. A local is recorded again after a statement that takes
/// `&mut` of it, and after a bare `local.method(..);` call. Closures, nested
/// items and async blocks keep their own scopes and are left alone.
pub fn record_bindings(block: &mut Block,) {
    Recorder.visit_block_mut(block,);
}

struct Recorder;

impl VisitMut for Recorder {
    fn visit_block_mut(&mut self, block: &mut Block,) {
        let stmts = std::mem::take(&mut block.stmts,);
        let count = stmts.len();
        for (index, mut stmt,) in stmts.into_iter().enumerate() {
            self.visit_stmt_mut(&mut stmt,);
            // the block's value
            let tail = index + 1 == count && matches!(stmt, Stmt::Expr(_, None,));
            let names = if tail { Vec::new() } else { bound_by(&stmt,) };
            block.stmts.push(stmt,);
            block.stmts.extend(names.iter().map(bind_stmt,),);
        }
    }

    fn visit_expr_for_loop_mut(&mut self, node: &mut ExprForLoop,) {
        visit_mut::visit_expr_for_loop_mut(self, node,);
        prepend(&mut node.body, &names_in(&node.pat,),);
    }

    fn visit_expr_if_mut(&mut self, node: &mut ExprIf,) {
        visit_mut::visit_expr_if_mut(self, node,);
        if let Expr::Let(binding,) = &*node.cond {
            let names = names_in(&binding.pat,);
            prepend(&mut node.then_branch, &names,);
        }
    }

    fn visit_expr_while_mut(&mut self, node: &mut ExprWhile,) {
        visit_mut::visit_expr_while_mut(self, node,);
        if let Expr::Let(binding,) = &*node.cond {
            let names = names_in(&binding.pat,);
            prepend(&mut node.body, &names,);
        }
    }

    fn visit_arm_mut(&mut self, arm: &mut Arm,) {
        visit_mut::visit_arm_mut(self, arm,);
        let names = names_in(&arm.pat,);
        if names.is_empty() {
            return;
        }
        let binds = names.iter().map(bind_stmt,);
        let body = &arm.body;
        arm.body = Box::new(syn::parse_quote!({ #(#binds)* #body }),);
    }

    // separate scopes
    fn visit_expr_closure_mut(&mut self, _: &mut ExprClosure,) {}

    fn visit_expr_async_mut(&mut self, _: &mut ExprAsync,) {}

    fn visit_item_mut(&mut self, _: &mut Item,) {}
}

fn prepend(block: &mut Block, names: &[Ident],) {
    block.stmts.splice(0..0, names.iter().map(bind_stmt,),);
}

// `line!()` spanned at the name reports the line of the binding.
fn bind_stmt(name: &Ident,) -> Stmt {
    let text = name.unraw().to_string();
    let line = quote_spanned!(name.span()=> ::std::line!());
    syn::parse_quote! {
        ::marbles::frame::bind(
            #text,
            ::marbles::__capture!(#name, ::marbles::frame::MAX_RECORDED_LEN),
            #line,
        );
    }
}

/// Locals a statement (re)binds or changes once it has run.
pub fn bound_by(stmt: &Stmt,) -> Vec<Ident,> {
    let mut names = match stmt {
        // a `let` may keep the borrows its initializer takes
        Stmt::Local(local,) if local.init.is_some() => return names_in(&local.pat,),
        Stmt::Expr(Expr::Assign(assign,), Some(_,),) => assigned_root(&assign.left,).into_iter().collect(),
        Stmt::Expr(Expr::Binary(binary,), Some(_,),) if is_compound_assign(&binary.op,) => {
            assigned_root(&binary.left,).into_iter().collect()
        }
        Stmt::Expr(Expr::MethodCall(call,), Some(_,),) if !call.method.to_string().starts_with("into_",) => {
            assigned_root(&call.receiver,).into_iter().collect()
        }
        Stmt::Expr(..,) => Vec::new(),
        _ => return Vec::new(),
    };
    if let Stmt::Expr(expr, _,) = stmt {
        let mut borrows = MutBorrows::default();
        borrows.visit_expr(expr,);
        for name in borrows.0 {
            if !names.contains(&name,) {
                names.push(name,);
            }
        }
    }
    names
}

/// Locals taken by `&mut` in an expression whose borrows end with it.
#[derive(Default,)]
struct MutBorrows(Vec<Ident,>,);

impl<'ast,> Visit<'ast,> for MutBorrows {
    fn visit_expr_reference(&mut self, node: &'ast ExprReference,) {
        if node.mutability.is_some() {
            if let Some(name,) = assigned_root(&node.expr,) {
                if !self.0.contains(&name,) {
                    self.0.push(name,);
                }
            }
        }
        visit::visit_expr_reference(self, node,);
    }

    // the assigned place may hold on to the borrow
    fn visit_expr_assign(&mut self, node: &'ast ExprAssign,) {
        self.visit_expr(&node.left,);
    }

    fn visit_local(&mut self, _: &'ast Local,) {}

    fn visit_expr_closure(&mut self, _: &'ast ExprClosure,) {}

    fn visit_expr_async(&mut self, _: &'ast ExprAsync,) {}

    fn visit_item(&mut self, _: &'ast Item,) {}
}

fn is_compound_assign(op: &BinOp,) -> bool {
    matches!(
        op,
        BinOp::AddAssign(_,)
            | BinOp::SubAssign(_,)
            | BinOp::MulAssign(_,)
            | BinOp::DivAssign(_,)
            | BinOp::RemAssign(_,)
            | BinOp::BitXorAssign(_,)
            | BinOp::BitAndAssign(_,)
            | BinOp::BitOrAssign(_,)
            | BinOp::ShlAssign(_,)
            | BinOp::ShrAssign(_,)
    )
}

/// The local behind an assignment target: `x`, `x.field`, `x[i]`, `*x`.
fn assigned_root(target: &Expr,) -> Option<Ident,> {
    match target {
        Expr::Path(path,) if path.qself.is_none() => path.path.get_ident().filter(|ident| is_recordable(ident,),).cloned(),
        Expr::Field(field,) => assigned_root(&field.base,),
        Expr::Index(index,) => assigned_root(&index.expr,),
        Expr::Unary(unary,) => assigned_root(&unary.expr,),
        Expr::Paren(paren,) => assigned_root(&paren.expr,),
        _ => None,
    }
}

/// Names a pattern binds, in source order.
pub fn names_in(pat: &Pat,) -> Vec<Ident,> {
    let mut names = Vec::new();
    collect(pat, &mut names,);
    names
}

fn collect(pat: &Pat, names: &mut Vec<Ident,>,) {
    match pat {
        Pat::Ident(binding,) => {
            if is_recordable(&binding.ident,) {
                names.push(binding.ident.clone(),);
            }
            if let Some((_, sub,),) = &binding.subpat {
                collect(sub, names,);
            }
        }
        Pat::Tuple(tuple,) => tuple.elems.iter().for_each(|elem| collect(elem, names,),),
        Pat::TupleStruct(tuple,) => tuple.elems.iter().for_each(|elem| collect(elem, names,),),
        Pat::Struct(record,) => record.fields.iter().for_each(|field| collect(&field.pat, names,),),
        Pat::Slice(slice,) => slice.elems.iter().for_each(|elem| collect(elem, names,),),
        Pat::Reference(reference,) => collect(&reference.pat, names,),
        Pat::Type(typed,) => collect(&typed.pat, names,),
        Pat::Paren(paren,) => collect(&paren.pat, names,),
        // every alternative binds the same names
        Pat::Or(or,) => {
            if let Some(first,) = or.cases.first() {
                collect(first, names,);
            }
        }
        _ => {}
    }
}

// `_x` is never shown, and an upper-case ident in a pattern is a unit
// struct, variant or constant rather than a new binding.
fn is_recordable(ident: &Ident,) -> bool {
    let text = ident.unraw().to_string();
    !text.starts_with('_',) && !text.starts_with(|c: char| c.is_uppercase(),) && text != "self"
}
