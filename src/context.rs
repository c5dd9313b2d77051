use crate::value::Value;


/// The context stack a template renders against.
///
/// Frames are stored outermost first so that entering a section is a push;
/// name resolution walks them innermost first.
#[derive(Clone, Debug, Default)]
pub(crate) struct Stack {
    frames: Vec<Value>
}


impl Stack {
    /// Build a stack from contexts given innermost first.
    pub(crate) fn from(contexts: &[Value]) -> Self {
        Stack {
            frames: contexts.iter().rev().cloned().collect()
        }
    }

    pub(crate) fn push(&mut self, frame: Value) {
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self) -> Option<Value> {
        self.frames.pop()
    }

    /// Frames from innermost to outermost.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Value> {
        self.frames.iter().rev()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn innermost_first() {
        let mut stack = Stack::from(&[Value::from("inner"), Value::from("outer")]);
        stack.push(Value::from("pushed"));
        let names = stack.iter().map(Value::to_string).collect::<Vec<_>>();
        assert_eq!(names, vec!["pushed", "inner", "outer"]);
        assert_eq!(stack.pop().map(|v| v.to_string()), Some("pushed".to_owned()));
        assert_eq!(stack.iter().count(), 2);
    }
}
