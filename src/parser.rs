use crate::ast::*;
use crate::lexer::Token;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0 }
    }

    fn current_token(&self) -> &Token {
        self.tokens.get(self.current).unwrap_or(&Token::Eof)
    }

    fn consume(&mut self, expected: Token) -> Result<(), String> {
        if *self.current_token() == expected {
            self.current += 1;
            Ok(())
        } else {
            Err(format!("Expected {:?}, found {:?}", expected, self.current_token()))
        }
    }

    fn advance(&mut self) -> Token {
        let token = self.current_token().clone();
        self.current += 1;
        token
    }

    fn expect_identifier(&mut self) -> Result<String, String> {
        match self.advance() {
            Token::Identifier(name) => Ok(name),
            other => Err(format!("Expected identifier, found {:?}", other)),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, String> {
        match self.current_token() {
            Token::Select => self.parse_select(),
            Token::Insert => self.parse_insert(),
            Token::Update => self.parse_update(),
            Token::Delete => self.parse_delete(),
            Token::Create => self.parse_create(),
            Token::Drop => self.parse_drop(),
            Token::Alter => self.parse_alter(),
            Token::Begin => {
                self.advance();
                if *self.current_token() == Token::Transaction {
                    self.advance();
                }
                Ok(Statement::Begin)
            }
            Token::Commit => {
                self.advance();
                if *self.current_token() == Token::Transaction {
                    self.advance();
                }
                Ok(Statement::Commit)
            }
            Token::Rollback => {
                self.advance();
                if *self.current_token() == Token::Transaction {
                    self.advance();
                }
                Ok(Statement::Rollback)
            }
            other => Err(format!("Unexpected token: {:?}", other)),
        }
    }

    fn parse_select(&mut self) -> Result<Statement, String> {
        self.consume(Token::Select)?;
        let columns = self.parse_columns()?;
        self.consume(Token::From)?;
        let table = self.expect_identifier()?;

        let where_clause = if *self.current_token() == Token::Where {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };

        let order_by = if *self.current_token() == Token::Order {
            self.advance();
            self.consume(Token::By)?;
            let column = self.expect_identifier()?;
            let asc = if *self.current_token() == Token::Desc {
                self.advance();
                false
            } else {
                if *self.current_token() == Token::Asc {
                    self.advance();
                }
                true
            };
            Some(OrderByExpr { column, asc })
        } else {
            None
        };

        let limit = if *self.current_token() == Token::Limit {
            self.advance();
            match self.advance() {
                Token::Number(n) => Some(n as usize),
                other => return Err(format!("Expected number after LIMIT, found {:?}", other)),
            }
        } else {
            None
        };

        let offset = if *self.current_token() == Token::Offset {
            self.advance();
            match self.advance() {
                Token::Number(n) => Some(n as usize),
                other => return Err(format!("Expected number after OFFSET, found {:?}", other)),
            }
        } else {
            None
        };

        Ok(Statement::Select(SelectStatement {
            columns,
            from: table,
            where_clause,
            order_by,
            limit,
            offset,
        }))
    }

    fn parse_columns(&mut self) -> Result<Vec<Column>, String> {
        if *self.current_token() == Token::Star {
            self.advance();
            return Ok(vec![Column::All]);
        }
        let mut columns = vec![Column::Named(self.expect_identifier()?)];
        while *self.current_token() == Token::Comma {
            self.advance();
            columns.push(Column::Named(self.expect_identifier()?));
        }
        Ok(columns)
    }

    fn parse_insert(&mut self) -> Result<Statement, String> {
        self.consume(Token::Insert)?;
        self.consume(Token::Into)?;
        let table = self.expect_identifier()?;

        let columns = if *self.current_token() == Token::LeftParen {
            self.advance();
            let mut names = vec![self.expect_identifier()?];
            while *self.current_token() == Token::Comma {
                self.advance();
                names.push(self.expect_identifier()?);
            }
            self.consume(Token::RightParen)?;
            Some(names)
        } else {
            None
        };

        self.consume(Token::Values)?;
        self.consume(Token::LeftParen)?;
        let mut values = vec![self.parse_value()?];
        while *self.current_token() == Token::Comma {
            self.advance();
            values.push(self.parse_value()?);
        }
        self.consume(Token::RightParen)?;

        Ok(Statement::Insert(InsertStatement { table, columns, values }))
    }

    fn parse_update(&mut self) -> Result<Statement, String> {
        self.consume(Token::Update)?;
        let table = self.expect_identifier()?;
        self.consume(Token::Set)?;

        let mut assignments = vec![self.parse_assignment()?];
        while *self.current_token() == Token::Comma {
            self.advance();
            assignments.push(self.parse_assignment()?);
        }

        let where_clause = if *self.current_token() == Token::Where {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(Statement::Update(UpdateStatement { table, assignments, where_clause }))
    }

    fn parse_assignment(&mut self) -> Result<Assignment, String> {
        let column = self.expect_identifier()?;
        self.consume(Token::Equal)?;
        let value = self.parse_value()?;
        Ok(Assignment { column, value })
    }

    fn parse_delete(&mut self) -> Result<Statement, String> {
        self.consume(Token::Delete)?;
        self.consume(Token::From)?;
        let table = self.expect_identifier()?;

        let where_clause = if *self.current_token() == Token::Where {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(Statement::Delete(DeleteStatement { table, where_clause }))
    }

    fn parse_create(&mut self) -> Result<Statement, String> {
        self.consume(Token::Create)?;
        match self.current_token() {
            Token::Table => self.parse_create_table(),
            Token::Index => self.parse_create_index(Token::Index, IndexKind::NonUnique),
            Token::Unique => {
                self.advance();
                self.parse_create_index(Token::Index, IndexKind::Unique)
            }
            Token::Fulltext => {
                self.advance();
                self.parse_create_index(Token::Index, IndexKind::FullText)
            }
            other => Err(format!("Expected TABLE, INDEX, UNIQUE or FULLTEXT, found {:?}", other)),
        }
    }

    fn parse_create_table(&mut self) -> Result<Statement, String> {
        self.consume(Token::Table)?;
        let name = self.expect_identifier()?;
        self.consume(Token::LeftParen)?;

        let mut columns = vec![self.parse_column_definition()?];
        while *self.current_token() == Token::Comma {
            self.advance();
            columns.push(self.parse_column_definition()?);
        }
        self.consume(Token::RightParen)?;

        Ok(Statement::CreateTable(CreateTableStatement { name, columns }))
    }

    fn parse_column_definition(&mut self) -> Result<ColumnDefinition, String> {
        let name = self.expect_identifier()?;
        let data_type = match self.advance() {
            Token::Integer => DataType::Integer,
            Token::Float => DataType::Float,
            Token::Text => DataType::Text,
            Token::Boolean => DataType::Boolean,
            other => return Err(format!("Expected a column type, found {:?}", other)),
        };
        let primary_key = if *self.current_token() == Token::Primary {
            self.advance();
            self.consume(Token::Key)?;
            true
        } else {
            false
        };
        Ok(ColumnDefinition { name, data_type, primary_key })
    }

    fn parse_create_index(&mut self, expect: Token, kind: IndexKind) -> Result<Statement, String> {
        self.consume(expect)?;
        let name = self.expect_identifier()?;
        self.consume(Token::On)?;
        let table = self.expect_identifier()?;
        self.consume(Token::LeftParen)?;
        let column = self.expect_identifier()?;
        self.consume(Token::RightParen)?;
        Ok(Statement::CreateIndex(CreateIndexStatement { name, table, column, kind }))
    }

    fn parse_drop(&mut self) -> Result<Statement, String> {
        self.consume(Token::Drop)?;
        match self.current_token() {
            Token::Table => {
                self.advance();
                let name = self.expect_identifier()?;
                Ok(Statement::DropTable(DropTableStatement { name }))
            }
            Token::Index => {
                self.advance();
                let name = self.expect_identifier()?;
                Ok(Statement::DropIndex(DropIndexStatement { name }))
            }
            other => Err(format!("Expected TABLE or INDEX, found {:?}", other)),
        }
    }

    fn parse_alter(&mut self) -> Result<Statement, String> {
        self.consume(Token::Alter)?;
        self.consume(Token::Table)?;
        let table = self.expect_identifier()?;

        let action = match self.current_token() {
            Token::Add => {
                self.advance();
                if *self.current_token() == Token::Column {
                    self.advance();
                }
                AlterAction::AddColumn(self.parse_column_definition()?)
            }
            Token::Drop => {
                self.advance();
                if *self.current_token() == Token::Column {
                    self.advance();
                }
                AlterAction::DropColumn(self.expect_identifier()?)
            }
            Token::Rename => {
                self.advance();
                if *self.current_token() == Token::Column {
                    self.advance();
                }
                let from = self.expect_identifier()?;
                self.consume(Token::To)?;
                let to = self.expect_identifier()?;
                AlterAction::RenameColumn { from, to }
            }
            other => return Err(format!("Expected ADD, DROP or RENAME, found {:?}", other)),
        };

        Ok(Statement::AlterTable(AlterTableStatement { table, action }))
    }

    fn parse_value(&mut self) -> Result<Value, String> {
        match self.advance() {
            Token::Number(n) => Ok(Value::Integer(n)),
            Token::FloatLiteral(f) => Ok(Value::Float(f)),
            Token::StringLiteral(s) => Ok(Value::Text(s)),
            Token::True => Ok(Value::Boolean(true)),
            Token::False => Ok(Value::Boolean(false)),
            Token::Null => Ok(Value::Null),
            other => Err(format!("Expected a literal value, found {:?}", other)),
        }
    }

    /// Parses a WHERE clause. Precedence (loosest first): `OR`, then `AND`,
    /// then a single comparison — matching the three levels §1's "routine
    /// glue" filter expressions actually need.
    fn parse_expression(&mut self) -> Result<Expression, String> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression, String> {
        let mut left = self.parse_and()?;
        while *self.current_token() == Token::Or {
            self.advance();
            let right = self.parse_and()?;
            left = Expression::BinaryOp { left: Box::new(left), op: BinaryOperator::Or, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, String> {
        let mut left = self.parse_comparison()?;
        while *self.current_token() == Token::And {
            self.advance();
            let right = self.parse_comparison()?;
            left = Expression::BinaryOp { left: Box::new(left), op: BinaryOperator::And, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expression, String> {
        let left = self.parse_operand()?;
        let op = match self.current_token() {
            Token::Equal => BinaryOperator::Equal,
            Token::NotEqual => BinaryOperator::NotEqual,
            Token::LessThan => BinaryOperator::LessThan,
            Token::LessThanOrEqual => BinaryOperator::LessThanOrEqual,
            Token::GreaterThan => BinaryOperator::GreaterThan,
            Token::GreaterThanOrEqual => BinaryOperator::GreaterThanOrEqual,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_operand()?;
        Ok(Expression::BinaryOp { left: Box::new(left), op, right: Box::new(right) })
    }

    fn parse_operand(&mut self) -> Result<Expression, String> {
        match self.current_token() {
            Token::Identifier(_) => Ok(Expression::Column(self.expect_identifier()?)),
            _ => Ok(Expression::Value(self.parse_value()?)),
        }
    }
}

pub fn parse(tokens: Vec<Token>) -> Result<Statement, String> {
    let mut parser = Parser::new(tokens);
    let statement = parser.parse_statement()?;
    parser.consume(Token::Semicolon).or_else(|_| {
        if *parser.current_token() == Token::Eof {
            Ok(())
        } else {
            Err(format!("Unexpected trailing token: {:?}", parser.current_token()))
        }
    })?;
    Ok(statement)
}
