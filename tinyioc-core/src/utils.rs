//! Utility functions for the container
//!
//! Naming helpers for default bean names, the per-thread creation tracker used
//! to detect circular references while a bean is being built, and static
//! validation of the declared dependency graph.

/// Naming convention utilities for bean names
pub mod naming {
    /// Converts a PascalCase type name to camelCase for bean naming.
    ///
    /// This is the default bean naming strategy, where `UserService`
    /// becomes `userService`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tinyioc_core::utils::naming::to_camel_case;
    ///
    /// assert_eq!(to_camel_case("UserService"), "userService");
    /// assert_eq!(to_camel_case("A"), "a");
    /// assert_eq!(to_camel_case(""), "");
    /// ```
    pub fn to_camel_case(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut result = String::with_capacity(s.len());
                result.extend(first.to_lowercase());
                result.push_str(chars.as_str());
                result
            }
        }
    }

    /// Strips the module path and generic arguments from a type name.
    ///
    /// ```
    /// use tinyioc_core::utils::naming::short_type_name;
    ///
    /// assert_eq!(short_type_name("app::service::UserService"), "UserService");
    /// assert_eq!(short_type_name("app::Cache<alloc::string::String>"), "Cache");
    /// assert_eq!(short_type_name("Plain"), "Plain");
    /// ```
    pub fn short_type_name(type_name: &str) -> &str {
        let without_generics = type_name.split('<').next().unwrap_or(type_name);
        without_generics
            .rsplit("::")
            .next()
            .unwrap_or(without_generics)
    }
}

/// Dependency resolution utilities
pub mod dependency {
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};

    thread_local! {
        /// Beans currently being created on this thread, tagged with the owning factory id
        static CREATING: RefCell<Vec<(u64, String)>> = const { RefCell::new(Vec::new()) };
    }

    /// Tracks beans currently being created to detect circular dependencies.
    ///
    /// Creation is synchronous, so a bean that re-enters its own creation on
    /// the same thread is a cycle. Entries are kept per thread, which lets
    /// unrelated threads create the same bean name without false positives.
    #[derive(Debug, Clone, Copy)]
    pub struct CreationTracker {
        factory_id: u64,
    }

    impl CreationTracker {
        /// Creates a tracker scoped to one factory.
        pub fn new(factory_id: u64) -> Self {
            Self { factory_id }
        }

        /// Checks if a bean is currently being created on this thread.
        pub fn is_creating(&self, name: &str) -> bool {
            CREATING.with(|stack| {
                stack
                    .borrow()
                    .iter()
                    .any(|(id, n)| *id == self.factory_id && n == name)
            })
        }

        /// Marks a bean as being created.
        ///
        /// # Errors
        ///
        /// Returns the creation chain ending with `name` if the bean is
        /// already being created on this thread.
        pub fn start_creating(&self, name: &str) -> Result<CreationGuard, Vec<String>> {
            if self.is_creating(name) {
                let mut chain = self.current_creating();
                if let Some(start) = chain.iter().position(|n| n == name) {
                    chain.drain(..start);
                }
                chain.push(name.to_string());
                return Err(chain);
            }

            CREATING.with(|stack| {
                stack
                    .borrow_mut()
                    .push((self.factory_id, name.to_string()))
            });

            Ok(CreationGuard {
                factory_id: self.factory_id,
                name: name.to_string(),
            })
        }

        /// Gets the beans currently being created on this thread, outermost first.
        pub fn current_creating(&self) -> Vec<String> {
            CREATING.with(|stack| {
                stack
                    .borrow()
                    .iter()
                    .filter(|(id, _)| *id == self.factory_id)
                    .map(|(_, n)| n.clone())
                    .collect()
            })
        }
    }

    /// Clears the creation mark when dropped, whether creation succeeded or not.
    #[derive(Debug)]
    pub struct CreationGuard {
        factory_id: u64,
        name: String,
    }

    impl Drop for CreationGuard {
        fn drop(&mut self) {
            CREATING.with(|stack| {
                let mut stack = stack.borrow_mut();
                if let Some(pos) = stack
                    .iter()
                    .rposition(|(id, n)| *id == self.factory_id && *n == self.name)
                {
                    stack.remove(pos);
                }
            });
        }
    }

    /// Dependency graph analysis result
    #[derive(Debug)]
    pub enum DependencyValidationError {
        /// Circular dependency detected
        CircularDependency {
            /// The dependency chain forming the cycle
            cycle: Vec<String>,
        },
        /// Missing dependency detected
        MissingDependency {
            /// The bean that requires the dependency
            bean: String,
            /// The missing dependency
            missing: String,
        },
    }

    impl std::fmt::Display for DependencyValidationError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::CircularDependency { cycle } => {
                    write!(f, "Circular dependency detected: {}", cycle.join(" -> "))
                }
                Self::MissingDependency { bean, missing } => {
                    write!(f, "Bean '{}' depends on '{}' which is not registered", bean, missing)
                }
            }
        }
    }

    /// Validates dependency graph for circular dependencies and missing beans
    ///
    /// # Arguments
    ///
    /// * `dependencies` - Map of bean name to the bean names it references
    ///
    /// # Returns
    ///
    /// Returns Ok(()) if no issues found, or Err with the first detected issue.
    /// Beans are visited in name order so the reported issue is stable.
    pub fn validate_dependency_graph(
        dependencies: &HashMap<String, Vec<String>>,
    ) -> Result<(), DependencyValidationError> {
        let mut names: Vec<&String> = dependencies.keys().collect();
        names.sort();

        for bean_name in &names {
            for dep in &dependencies[*bean_name] {
                if !dependencies.contains_key(dep) {
                    return Err(DependencyValidationError::MissingDependency {
                        bean: (*bean_name).clone(),
                        missing: dep.clone(),
                    });
                }
            }
        }

        let mut visited = HashSet::new();
        let mut rec_stack = Vec::new();

        for bean_name in names {
            if !visited.contains(bean_name.as_str()) {
                if let Some(cycle) =
                    detect_cycle_dfs(bean_name, dependencies, &mut visited, &mut rec_stack)
                {
                    return Err(DependencyValidationError::CircularDependency { cycle });
                }
            }
        }

        Ok(())
    }

    /// DFS-based cycle detection
    ///
    /// Returns Some(cycle) if a cycle is detected, None otherwise
    fn detect_cycle_dfs(
        node: &str,
        graph: &HashMap<String, Vec<String>>,
        visited: &mut HashSet<String>,
        rec_stack: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        rec_stack.push(node.to_string());

        if let Some(deps) = graph.get(node) {
            for dep in deps {
                if !visited.contains(dep) {
                    if let Some(cycle) = detect_cycle_dfs(dep, graph, visited, rec_stack) {
                        return Some(cycle);
                    }
                } else if let Some(start_idx) = rec_stack.iter().position(|x| x == dep) {
                    let mut cycle = rec_stack[start_idx..].to_vec();
                    cycle.push(dep.to_string());
                    return Some(cycle);
                }
            }
        }

        rec_stack.pop();
        None
    }
}
